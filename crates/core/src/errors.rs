use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the proxy runtime.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// `start` was called while the server was already running.
    #[error("already running")]
    AlreadyRunning,
    /// `stop` was called while the server was not running.
    #[error("not running")]
    NotRunning,
    /// Failed to bind to the requested socket.
    #[error("failed to bind proxy socket: {0}")]
    Bind(std::io::Error),
    /// Axum server error.
    #[error("server error: {0}")]
    Server(std::io::Error),
    /// Upstream TLS material could not be loaded or combined.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised while preparing the upstream TLS transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A certificate or key file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Read {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The CA bundle contained no usable certificate.
    #[error("could not add ca cert: no certificate found in PEM data")]
    NoCertificates,
    /// The client certificate PEM contained no certificate.
    #[error("client certificate PEM contains no certificate")]
    EmptyClientCertificate,
    /// The client key PEM contained no private key.
    #[error("client key PEM contains no private key")]
    MissingPrivateKey,
    /// Only one half of the client identity was supplied.
    #[error("client certificate and client key must be configured together")]
    IncompleteClientIdentity,
    /// PEM data was malformed.
    #[error("malformed PEM data: {0}")]
    Pem(std::io::Error),
    /// rustls rejected the configuration, e.g. a certificate/key mismatch.
    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] rustls::Error),
}
