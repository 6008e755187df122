//! Start/stop lifecycle of the listening proxy.

use crate::errors::{ProxyError, TransportError};
use crate::server::{AppState, PipelineSettings, router};
use crate::transport::{UpstreamTls, build_client};
use axum::{Router, serve};
use std::future::IntoFuture;
use http::Uri;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tether_config::{Config, DEFAULT_PORT, Secret, without_userinfo};
use tokio::net::TcpListener;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, info, warn};

/// Wraps the proxy's router, e.g. to add a `tower` layer.
pub type Middleware = Arc<dyn Fn(Router) -> Router + Send + Sync>;

#[derive(Debug)]
enum Lifecycle {
    Idle,
    Running {
        local_addr: Option<SocketAddr>,
        shutdown: Option<oneshot::Sender<()>>,
    },
}

/// Single-target reverse proxy.
///
/// Configure it with the `with_*` methods, then call [`ProxyServer::start`],
/// which serves until [`ProxyServer::stop`] is called from another task.
pub struct ProxyServer {
    bind_address: SocketAddr,
    settings: PipelineSettings,
    tls: UpstreamTls,
    middleware: Vec<Middleware>,
    drain_timeout: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyServer")
            .field("bind_address", &self.bind_address)
            .field("settings", &self.settings)
            .field("tls", &self.tls)
            .field("middleware", &self.middleware.len())
            .field("drain_timeout", &self.drain_timeout)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

impl ProxyServer {
    /// Listen address used when none is configured.
    pub const DEFAULT_BIND_ADDRESS: SocketAddr =
        SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), DEFAULT_PORT);

    /// How long `start` waits for in-flight requests after `stop`.
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a proxy forwarding to `target` with every option disabled.
    ///
    /// Userinfo in `target` is dropped.
    pub fn new(target: Uri) -> Self {
        Self {
            bind_address: Self::DEFAULT_BIND_ADDRESS,
            settings: PipelineSettings {
                target: without_userinfo(target),
                debug: false,
                secret: None,
                base_path: None,
            },
            tls: UpstreamTls::new(),
            middleware: Vec::new(),
            drain_timeout: Self::DEFAULT_DRAIN_TIMEOUT,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Build a proxy from a resolved [`Config`], loading its TLS files.
    pub fn from_config(config: &Config) -> Result<Self, ProxyError> {
        let tls = config.tls();
        let mut server = Self::new(config.target().clone())
            .with_bind_address(config.bind_address())
            .with_debug(config.debug());
        if let Some(secret) = config.secret() {
            server = server.with_secret(secret.clone());
        }
        if let Some(base_path) = config.base_path() {
            server = server.with_base_path(base_path);
        }
        if let Some(path) = tls.ca_cert.as_deref() {
            server = server.with_ca_cert(path)?;
        }
        if let Some(path) = tls.client_cert.as_deref() {
            server = server.with_client_cert(path)?;
        }
        if let Some(path) = tls.client_key.as_deref() {
            server = server.with_client_key(path)?;
        }
        Ok(server)
    }

    /// Listen on `address`.
    pub const fn with_bind_address(mut self, address: SocketAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Log one audit line per request and warn on rejected requests.
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.settings.debug = debug;
        self
    }

    /// Only forward requests carrying `secret`.
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.settings.secret = Some(secret);
        self
    }

    /// Remove the first occurrence of `base_path` from request paths.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        self.settings.base_path = (!base_path.is_empty()).then_some(base_path);
        self
    }

    /// Bound the wait for in-flight requests once [`ProxyServer::stop`] is called.
    pub const fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Append a middleware. The first one added is the outermost.
    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Trust only the CA certificates in the PEM file at `path`.
    pub fn with_ca_cert(mut self, path: &Path) -> Result<Self, TransportError> {
        self.tls.load_ca_cert(path)?;
        Ok(self)
    }

    /// Present the PEM certificate at `path` to the upstream.
    pub fn with_client_cert(mut self, path: &Path) -> Result<Self, TransportError> {
        self.tls.load_client_cert(path)?;
        Ok(self)
    }

    /// Use the PEM private key at `path` for the client certificate.
    pub fn with_client_key(mut self, path: &Path) -> Result<Self, TransportError> {
        self.tls.load_client_key(path)?;
        Ok(self)
    }

    /// Replace the upstream TLS settings.
    pub fn with_tls(mut self, tls: UpstreamTls) -> Self {
        self.tls = tls;
        self
    }

    /// Upstream every request is forwarded to.
    pub const fn target(&self) -> &Uri {
        &self.settings.target
    }

    /// Address actually bound while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.lock() {
            Lifecycle::Running { local_addr, .. } => local_addr,
            Lifecycle::Idle => None,
        }
    }

    /// Whether `start` is currently serving.
    pub fn is_running(&self) -> bool {
        matches!(*self.lock(), Lifecycle::Running { .. })
    }

    /// Bind the listener and serve until [`ProxyServer::stop`] is called.
    ///
    /// Fails with [`ProxyError::AlreadyRunning`] if another call is serving.
    /// The client certificate and key are paired here, before binding.
    pub async fn start(&self) -> Result<(), ProxyError> {
        let shutdown = {
            let mut lifecycle = self.lock();
            if matches!(*lifecycle, Lifecycle::Running { .. }) {
                return Err(ProxyError::AlreadyRunning);
            }
            let (tx, rx) = oneshot::channel();
            *lifecycle = Lifecycle::Running {
                local_addr: None,
                shutdown: Some(tx),
            };
            rx
        };
        let _running = RunningGuard(&self.lifecycle);

        let client = build_client(self.tls.client_config()?);
        let app = self
            .middleware
            .iter()
            .rev()
            .fold(router(AppState::new(self.settings.clone(), client)), |app, wrap| wrap(app));

        let listener = TcpListener::bind(self.bind_address)
            .await
            .map_err(ProxyError::Bind)?;
        let local_addr = listener.local_addr().map_err(ProxyError::Bind)?;
        if let Lifecycle::Running { local_addr: slot, .. } = &mut *self.lock() {
            *slot = Some(local_addr);
        }
        info!(
            "proxy listening on http://{local_addr} forwarding to {}",
            self.settings.target
        );

        let stopping = Arc::new(Notify::new());
        let signalled = Arc::clone(&stopping);
        let serving = serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
            signalled.notify_one();
        })
        .into_future();
        let serving = pin!(serving);

        let drain_timeout = self.drain_timeout;
        tokio::select! {
            result = serving => result.map_err(ProxyError::Server)?,
            () = async {
                stopping.notified().await;
                tokio::time::sleep(drain_timeout).await;
            } => {
                warn!(?drain_timeout, "in-flight requests still running after drain timeout; stopping anyway");
            }
        }

        debug!(%local_addr, "proxy stopped");
        Ok(())
    }

    /// Stop a running server; the pending [`ProxyServer::start`] call returns.
    ///
    /// New connections are refused at once. In-flight requests get up to the
    /// drain timeout to finish before `start` returns; responses still
    /// streaming after that keep their connection until the upstream ends.
    pub fn stop(&self) -> Result<(), ProxyError> {
        let shutdown = match &mut *self.lock() {
            Lifecycle::Running { shutdown, .. } => shutdown.take(),
            Lifecycle::Idle => None,
        };
        let shutdown = shutdown.ok_or(ProxyError::NotRunning)?;
        // The serve loop may already have exited on its own.
        let _ = shutdown.send(());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the lifecycle to idle however `start` exits.
struct RunningGuard<'a>(&'a Mutex<Lifecycle>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Lifecycle::Idle;
    }
}
