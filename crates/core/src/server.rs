use crate::accountant::{ResponseAccountant, ResponseSink};
use crate::audit::{AuditTrail, RequestContext};
use crate::rewrite::{
    append_forwarded_for, build_upstream_uri, host_header, strip_base_path, strip_hop_by_hop,
};
use crate::sink::ChannelSink;
use crate::transport::HttpClient;
use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use http_body_util::BodyExt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tether_config::Secret;
use tracing::{debug, error, warn};

/// Per-request behavior, fixed before the server starts.
#[derive(Debug, Clone)]
pub(crate) struct PipelineSettings {
    pub(crate) target: Uri,
    pub(crate) debug: bool,
    pub(crate) secret: Option<Secret>,
    pub(crate) base_path: Option<String>,
}

/// State shared across all request handlers.
#[derive(Debug, Clone)]
pub(crate) struct AppState {
    settings: Arc<PipelineSettings>,
    client: HttpClient,
}

impl AppState {
    pub(crate) fn new(settings: PipelineSettings, client: HttpClient) -> Self {
        debug!(
            target_url = %settings.target,
            debug = settings.debug,
            secret = settings.secret.is_some(),
            base_path = ?settings.base_path,
            "initializing app state"
        );
        Self {
            settings: Arc::new(settings),
            client,
        }
    }
}

/// Constructs a new Axum [`Router`] with the provided application state.
pub(crate) fn router(state: AppState) -> Router {
    Router::new().fallback(any(proxy_handler)).with_state(state)
}

/// Outcome of the shared-secret check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Authorization {
    /// No secret is configured.
    Skipped,
    /// The header carried the expected secret.
    Granted,
    /// The header was absent or empty.
    Missing,
    /// The header carried another value.
    Invalid,
}

pub(crate) fn authorize(secret: Option<&Secret>, headers: &HeaderMap) -> Authorization {
    let Some(secret) = secret else {
        return Authorization::Skipped;
    };
    match headers.get(secret.header()) {
        None => Authorization::Missing,
        Some(value) if value.is_empty() => Authorization::Missing,
        Some(value) if value.as_bytes() == secret.value().as_bytes() => Authorization::Granted,
        Some(_) => Authorization::Invalid,
    }
}

async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let settings = &state.settings;
    let (mut parts, body) = request.into_parts();
    let original = parts.uri.clone();

    let path_and_query = match settings.base_path.as_deref() {
        Some(base_path) => strip_base_path(&parts.uri, base_path),
        None => parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string()),
    };

    if let Some(rejection) = reject_unauthorized(settings, &parts.headers) {
        return rejection;
    }

    let upstream = match build_upstream_uri(&settings.target, &path_and_query) {
        Ok(uri) => uri,
        Err(error) => {
            error!(
                error = ?error,
                incoming = %original,
                upstream = %settings.target,
                "failed to construct upstream uri"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    strip_hop_by_hop(&mut parts.headers);
    if let Some(ip) = client_ip {
        append_forwarded_for(&mut parts.headers, ip);
    }
    if let Some(host) = host_header(&settings.target) {
        parts.headers.insert(header::HOST, host);
    }
    parts.uri = upstream.clone();

    let context = RequestContext::new(parts.method.clone(), original, upstream);
    let (sink, head) = ChannelSink::new();
    tokio::spawn(relay(
        state.client.clone(),
        Request::from_parts(parts, body),
        sink,
        context,
        settings.debug,
    ));

    head.await
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

/// Answer the request directly when the shared secret is missing or wrong.
fn reject_unauthorized(settings: &PipelineSettings, headers: &HeaderMap) -> Option<Response> {
    let secret = settings.secret.as_ref()?;
    match authorize(Some(secret), headers) {
        Authorization::Skipped | Authorization::Granted => None,
        Authorization::Missing => {
            if settings.debug {
                warn!("got unauthorized request");
            }
            let body = format!("Missing or empty header {}", secret.label());
            Some((StatusCode::UNAUTHORIZED, body).into_response())
        }
        Authorization::Invalid => {
            if settings.debug {
                warn!("got request with invalid secret");
            }
            // Echoes the expected secret; kept for compatibility with existing clients.
            let body = format!("Invalid secret {}", secret.value());
            Some((StatusCode::FORBIDDEN, body).into_response())
        }
    }
}

/// Forward `request` and stream the answer into `sink`, auditing on the way out.
async fn relay(
    client: HttpClient,
    request: Request<Body>,
    mut sink: ChannelSink,
    context: RequestContext,
    audit: bool,
) {
    let upstream = context.upstream.clone();
    let outcome = {
        let mut trail = AuditTrail::new(ResponseAccountant::new(Some(&mut sink)), context, audit);
        forward(&client, request, &upstream, &mut *trail).await
    };
    if let Err(error) = outcome {
        sink.abort(error).await;
    }
}

/// Stream the upstream answer into `sink`.
///
/// Fails only when the upstream body breaks after the status line was sent,
/// in which case the response must be aborted rather than ended.
async fn forward<S: ResponseSink>(
    client: &HttpClient,
    request: Request<Body>,
    upstream: &Uri,
    sink: &mut S,
) -> io::Result<()> {
    let response = match client.request(request).await {
        Ok(response) => response,
        Err(error) => {
            error!(error = ?error, %upstream, "upstream request failed");
            sink.write_header(StatusCode::BAD_GATEWAY, HeaderMap::new());
            return Ok(());
        }
    };

    let (mut parts, mut body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    sink.write_header(parts.status, parts.headers);

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                warn!(error = ?error, %upstream, "upstream body failed mid-stream");
                return Err(io::Error::other(error));
            }
        };
        let Ok(data) = frame.into_data() else {
            continue;
        };
        if let Err(error) = sink.write(data).await {
            debug!(error = %error, %upstream, "client went away before the response completed");
            return Ok(());
        }
    }
    Ok(())
}
