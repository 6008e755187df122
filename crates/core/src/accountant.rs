//! Response accounting.
//!
//! A [`ResponseAccountant`] sits between the forwarding step and the real
//! [`ResponseSink`], recording the status code and the number of body bytes
//! the sink accepted. Bytes reach the sink unchanged.

use axum::body::Bytes;
use http::{HeaderMap, StatusCode};
use std::future::Future;
use std::io;

/// Destination of a response: a status line with headers, then body chunks.
pub trait ResponseSink: Send {
    /// Commit the status code and headers.
    fn write_header(&mut self, status: StatusCode, headers: HeaderMap);

    /// Write a body chunk, returning the number of bytes accepted.
    fn write(&mut self, data: Bytes) -> impl Future<Output = io::Result<usize>> + Send;
}

/// Decorator recording status code and body size of a response.
///
/// One accountant serves exactly one request, so no synchronization is done.
#[derive(Debug)]
pub struct ResponseAccountant<'a, S> {
    inner: Option<&'a mut S>,
    status: Option<StatusCode>,
    bytes_written: u64,
}

impl<'a, S: ResponseSink> ResponseAccountant<'a, S> {
    /// Wrap `inner`. A missing sink is tolerated: headers are dropped and body
    /// chunks are discarded as if fully accepted.
    pub const fn new(inner: Option<&'a mut S>) -> Self {
        Self {
            inner,
            status: None,
            bytes_written: 0,
        }
    }

    /// Last status code written, or `0` when none was.
    pub fn status_code(&self) -> u16 {
        self.status.map_or(0, |status| status.as_u16())
    }

    /// [`Self::status_code`] rendered as decimal text.
    pub fn status_code_string(&self) -> String {
        self.status_code().to_string()
    }

    /// Reason phrase for the status code, empty when unknown or unset.
    pub fn status_text(&self) -> &'static str {
        self.status
            .and_then(|status| status.canonical_reason())
            .unwrap_or_default()
    }

    /// Total body bytes accepted by the underlying sink.
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl<S: ResponseSink> ResponseSink for ResponseAccountant<'_, S> {
    fn write_header(&mut self, status: StatusCode, headers: HeaderMap) {
        self.status = Some(status);
        if let Some(inner) = self.inner.as_deref_mut() {
            inner.write_header(status, headers);
        }
    }

    fn write(&mut self, data: Bytes) -> impl Future<Output = io::Result<usize>> + Send {
        async move {
            let accepted = match self.inner.as_deref_mut() {
                Some(inner) => inner.write(data).await?,
                None => data.len(),
            };
            self.bytes_written += accepted as u64;
            Ok(accepted)
        }
    }
}
