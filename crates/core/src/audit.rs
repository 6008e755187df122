use crate::accountant::{ResponseAccountant, ResponseSink};
use http::{Method, Uri};
use std::ops::{Deref, DerefMut};
use std::time::Instant;
use tracing::info;

/// What is known about a request once it has been cleared for forwarding.
#[derive(Debug, Clone)]
pub(crate) struct RequestContext {
    pub(crate) method: Method,
    pub(crate) original: Uri,
    pub(crate) upstream: Uri,
    pub(crate) started: Instant,
}

impl RequestContext {
    pub(crate) fn new(method: Method, original: Uri, upstream: Uri) -> Self {
        Self {
            method,
            original,
            upstream,
            started: Instant::now(),
        }
    }

    /// `METHOD original(upstream), HTTP status bytes duration`.
    pub(crate) fn audit_line<S: ResponseSink>(&self, accountant: &ResponseAccountant<'_, S>) -> String {
        format!(
            "{} {}({}), HTTP {} {} {:?}",
            self.method,
            self.original,
            self.upstream,
            accountant.status_code_string(),
            accountant.bytes_written(),
            self.started.elapsed(),
        )
    }
}

/// Accountant that emits the audit line when it goes out of scope.
///
/// Dropping covers every way out of the forwarding step, including a panic
/// or the relay task being cancelled.
#[derive(Debug)]
pub(crate) struct AuditTrail<'a, S: ResponseSink> {
    accountant: ResponseAccountant<'a, S>,
    context: RequestContext,
    enabled: bool,
}

impl<'a, S: ResponseSink> AuditTrail<'a, S> {
    pub(crate) const fn new(
        accountant: ResponseAccountant<'a, S>,
        context: RequestContext,
        enabled: bool,
    ) -> Self {
        Self {
            accountant,
            context,
            enabled,
        }
    }
}

impl<'a, S: ResponseSink> Deref for AuditTrail<'a, S> {
    type Target = ResponseAccountant<'a, S>;

    fn deref(&self) -> &Self::Target {
        &self.accountant
    }
}

impl<S: ResponseSink> DerefMut for AuditTrail<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.accountant
    }
}

impl<S: ResponseSink> Drop for AuditTrail<'_, S> {
    fn drop(&mut self) {
        if self.enabled {
            info!("{}", self.context.audit_line(&self.accountant));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use axum::body::Bytes;
    use http::{HeaderMap, StatusCode};

    #[tokio::test]
    async fn audit_line_reports_outcome() {
        let (mut sink, _head) = ChannelSink::new();
        let mut accountant = ResponseAccountant::new(Some(&mut sink));
        accountant.write_header(StatusCode::NOT_FOUND, HeaderMap::new());
        let _ = accountant.write(Bytes::from_static(b"missing")).await;

        let context = RequestContext::new(
            Method::GET,
            "/api/users?page=2".parse().unwrap(),
            "http://backend/users?page=2".parse().unwrap(),
        );
        let line = context.audit_line(&accountant);

        assert!(
            line.starts_with("GET /api/users?page=2(http://backend/users?page=2), HTTP 404 "),
            "unexpected audit line: {line}"
        );
    }

    #[tokio::test]
    async fn trail_exposes_the_accountant() {
        let (mut sink, _head) = ChannelSink::new();
        let context = RequestContext::new(
            Method::POST,
            "/".parse().unwrap(),
            "http://backend/".parse().unwrap(),
        );
        let mut trail = AuditTrail::new(ResponseAccountant::new(Some(&mut sink)), context, true);

        trail.write_header(StatusCode::CREATED, HeaderMap::new());
        assert_eq!(trail.status_code(), 201);
    }
}
