use std::path::PathBuf;

/// Overrides provided via the CLI.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    target: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    debug: bool,
    secret: Option<String>,
    base_path: Option<String>,
    ca_cert: Option<PathBuf>,
    client_cert: Option<PathBuf>,
    client_key: Option<PathBuf>,
}

impl Overrides {
    /// Create an empty overrides instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the upstream target.
    pub fn target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Override the listen host and port.
    pub fn listen(mut self, host: Option<String>, port: Option<u16>) -> Self {
        self.host = host;
        self.port = port;
        self
    }

    /// Force debug mode on. A `false` value leaves the file setting in place.
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Override the shared secret.
    pub fn secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    /// Override the base path.
    pub fn base_path(mut self, base_path: Option<String>) -> Self {
        self.base_path = base_path;
        self
    }

    /// Override the upstream TLS files.
    pub fn tls(
        mut self,
        ca_cert: Option<PathBuf>,
        client_cert: Option<PathBuf>,
        client_key: Option<PathBuf>,
    ) -> Self {
        self.ca_cert = ca_cert;
        self.client_cert = client_cert;
        self.client_key = client_key;
        self
    }

    /// Returns `true` if no overriding values were provided.
    pub const fn is_empty(&self) -> bool {
        self.target.is_none()
            && self.host.is_none()
            && self.port.is_none()
            && !self.debug
            && self.secret.is_none()
            && self.base_path.is_none()
            && self.ca_cert.is_none()
            && self.client_cert.is_none()
            && self.client_key.is_none()
    }

    pub(crate) fn into_file_config(self) -> crate::FileConfig {
        crate::FileConfig {
            target: self.target,
            host: self.host,
            port: self.port,
            debug: self.debug.then_some(true),
            secret: self.secret,
            base_path: self.base_path,
            ca_cert: self.ca_cert,
            client_cert: self.client_cert,
            client_key: self.client_key,
        }
    }
}
