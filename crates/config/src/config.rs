use crate::Secret;
use http::Uri;
use std::net::SocketAddr;
use std::path::PathBuf;

/// File-backed TLS material used when talking to the upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsFiles {
    /// PEM bundle of certificate authorities trusted for the upstream.
    pub ca_cert: Option<PathBuf>,
    /// PEM client certificate presented to the upstream.
    pub client_cert: Option<PathBuf>,
    /// PEM private key matching `client_cert`.
    pub client_key: Option<PathBuf>,
}

impl TlsFiles {
    /// Returns `true` if no TLS file was configured.
    pub const fn is_empty(&self) -> bool {
        self.ca_cert.is_none() && self.client_cert.is_none() && self.client_key.is_none()
    }
}

/// Fully resolved proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    bind_address: SocketAddr,
    target: Uri,
    debug: bool,
    secret: Option<Secret>,
    base_path: Option<String>,
    tls: TlsFiles,
}

impl Config {
    /// Construct a new [`Config`] with authorization, rewriting and TLS disabled.
    pub const fn new(bind_address: SocketAddr, target: Uri) -> Self {
        Self {
            bind_address,
            target,
            debug: false,
            secret: None,
            base_path: None,
            tls: TlsFiles {
                ca_cert: None,
                client_cert: None,
                client_key: None,
            },
        }
    }

    /// Enable or disable debug mode.
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Require the given secret header on every request.
    pub fn with_secret(mut self, secret: Option<Secret>) -> Self {
        self.secret = secret;
        self
    }

    /// Strip the given base path from request paths.
    pub fn with_base_path(mut self, base_path: Option<String>) -> Self {
        self.base_path = base_path.filter(|path| !path.is_empty());
        self
    }

    /// Use the given TLS files for upstream connections.
    pub fn with_tls(mut self, tls: TlsFiles) -> Self {
        self.tls = tls;
        self
    }

    /// Address the proxy server will bind to.
    pub const fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Upstream every request is forwarded to.
    pub const fn target(&self) -> &Uri {
        &self.target
    }

    /// Whether per-request audit logging is enabled.
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Secret header requirement, if any.
    pub const fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }

    /// Base path removed from request paths, if any.
    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    /// TLS files for upstream connections.
    pub const fn tls(&self) -> &TlsFiles {
        &self.tls
    }
}
