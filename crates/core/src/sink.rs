use crate::accountant::ResponseSink;
use axum::body::{Body, Bytes};
use axum::response::Response;
use futures_util::stream;
use http::{HeaderMap, StatusCode};
use std::future::Future;
use std::io;
use tokio::sync::{mpsc, oneshot};

/// Body chunks buffered between the relay and the caller's connection.
const BODY_BUFFER: usize = 16;

type Chunk = Result<Bytes, io::Error>;

/// Sink streaming a response back to the inbound connection.
///
/// The first `write_header` hands a [`Response`] whose body is fed by later
/// `write` calls to the receiver returned from [`ChannelSink::new`]. Later
/// header writes are ignored, as the status line has already been sent.
#[derive(Debug)]
pub(crate) struct ChannelSink {
    pending: Option<(oneshot::Sender<Response>, mpsc::Receiver<Chunk>)>,
    body: mpsc::Sender<Chunk>,
}

impl ChannelSink {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Response>) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_BUFFER);
        let sink = Self {
            pending: Some((head_tx, body_rx)),
            body: body_tx,
        };
        (sink, head_rx)
    }

    /// Fail the response body so the caller's connection is torn down
    /// instead of ending as if the body were complete.
    pub(crate) async fn abort(&mut self, error: io::Error) {
        if self.pending.is_some() {
            self.write_header(StatusCode::BAD_GATEWAY, HeaderMap::new());
        }
        // A closed receiver means the caller already left.
        let _ = self.body.send(Err(error)).await;
    }
}

impl ResponseSink for ChannelSink {
    fn write_header(&mut self, status: StatusCode, headers: HeaderMap) {
        let Some((head, mut chunks)) = self.pending.take() else {
            return;
        };

        let body = Body::from_stream(stream::poll_fn(move |cx| chunks.poll_recv(cx)));
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        // A closed receiver means the caller left; the next write reports it.
        let _ = head.send(response);
    }

    fn write(&mut self, data: Bytes) -> impl Future<Output = io::Result<usize>> + Send {
        async move {
            if self.pending.is_some() {
                self.write_header(StatusCode::OK, HeaderMap::new());
            }
            if data.is_empty() {
                return Ok(0);
            }

            let len = data.len();
            self.body.send(Ok(data)).await.map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "client connection closed")
            })?;
            Ok(len)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn streams_header_then_body() {
        let (mut sink, head) = ChannelSink::new();

        let relay = tokio::spawn(async move {
            sink.write_header(StatusCode::ACCEPTED, HeaderMap::new());
            sink.write(Bytes::from_static(b"hel")).await.unwrap();
            sink.write(Bytes::from_static(b"lo")).await.unwrap();
        });

        let response = head.await.expect("header committed");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello");
        relay.await.unwrap();
    }

    #[tokio::test]
    async fn body_without_header_implies_ok() {
        let (mut sink, head) = ChannelSink::new();

        let relay = tokio::spawn(async move {
            sink.write(Bytes::from_static(b"implicit")).await.unwrap();
        });

        let response = head.await.expect("header committed");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"implicit");
        relay.await.unwrap();
    }

    #[tokio::test]
    async fn second_header_is_ignored() {
        let (mut sink, head) = ChannelSink::new();
        sink.write_header(StatusCode::OK, HeaderMap::new());
        sink.write_header(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new());
        drop(sink);

        let response = head.await.expect("header committed");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn abort_fails_the_body() {
        let (mut sink, head) = ChannelSink::new();

        let relay = tokio::spawn(async move {
            sink.write_header(StatusCode::OK, HeaderMap::new());
            sink.write(Bytes::from_static(b"hel")).await.unwrap();
            sink.abort(io::Error::other("upstream reset")).await;
        });

        let response = head.await.expect("header committed");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.into_body().collect().await.is_err());
        relay.await.unwrap();
    }

    #[tokio::test]
    async fn write_fails_once_caller_is_gone() {
        let (mut sink, head) = ChannelSink::new();
        drop(head);

        let err = sink.write(Bytes::from_static(b"lost")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
