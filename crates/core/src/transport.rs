//! Upstream transport: trusted roots and client identity for TLS backends.

use crate::errors::TransportError;
use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP(S) client used for every upstream call.
pub(crate) type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// TLS material for upstream connections.
///
/// CA trust is parsed as soon as it is loaded. The client certificate and key
/// are kept as raw PEM and only paired by [`UpstreamTls::client_config`], so
/// they can be supplied in either order.
#[derive(Debug, Clone, Default)]
pub struct UpstreamTls {
    roots: Option<RootCertStore>,
    client_cert: Option<Vec<u8>>,
    client_key: Option<Vec<u8>>,
}

impl UpstreamTls {
    /// Create TLS settings trusting the platform's native roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust only the certificates of the PEM bundle at `path`.
    pub fn load_ca_cert(&mut self, path: &Path) -> Result<(), TransportError> {
        let pem = read(path)?;
        self.set_ca_pem(&pem)
    }

    /// Trust only the certificates of the given PEM bundle.
    pub fn set_ca_pem(&mut self, pem: &[u8]) -> Result<(), TransportError> {
        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(parse_certs(pem));
        if added == 0 {
            return Err(TransportError::NoCertificates);
        }
        debug!(added, ignored, "loaded upstream ca bundle");
        self.roots = Some(roots);
        Ok(())
    }

    /// Read the client certificate presented to the upstream.
    pub fn load_client_cert(&mut self, path: &Path) -> Result<(), TransportError> {
        self.client_cert = Some(read(path)?);
        Ok(())
    }

    /// Read the private key for the client certificate.
    pub fn load_client_key(&mut self, path: &Path) -> Result<(), TransportError> {
        self.client_key = Some(read(path)?);
        Ok(())
    }

    /// Use the given PEM client certificate.
    pub fn set_client_cert_pem(&mut self, pem: impl Into<Vec<u8>>) {
        self.client_cert = Some(pem.into());
    }

    /// Use the given PEM private key.
    pub fn set_client_key_pem(&mut self, pem: impl Into<Vec<u8>>) {
        self.client_key = Some(pem.into());
    }

    /// Whether a custom CA bundle replaces the native roots.
    pub const fn has_custom_roots(&self) -> bool {
        self.roots.is_some()
    }

    /// Whether any part of a client identity was supplied.
    pub const fn has_client_identity(&self) -> bool {
        self.client_cert.is_some() || self.client_key.is_some()
    }

    /// Build the rustls configuration, pairing the client certificate and key.
    pub fn client_config(&self) -> Result<ClientConfig, TransportError> {
        let roots = self.roots.clone().unwrap_or_else(native_roots);
        let builder =
            ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()?
                .with_root_certificates(roots);

        let config = match (&self.client_cert, &self.client_key) {
            (None, None) => builder.with_no_client_auth(),
            (Some(cert), Some(key)) => {
                let chain = parse_certs(cert);
                if chain.is_empty() {
                    return Err(TransportError::EmptyClientCertificate);
                }
                let key = parse_private_key(key)?;
                builder.with_client_auth_cert(chain, key)?
            }
            _ => return Err(TransportError::IncompleteClientIdentity),
        };
        Ok(config)
    }
}

/// Build the pooled client for upstream calls; plain HTTP targets skip TLS.
pub(crate) fn build_client(tls: ClientConfig) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.enforce_http(false);

    let https = HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .wrap_connector(connector);
    Client::builder(TokioExecutor::new()).build(https)
}

fn read(path: &Path) -> Result<Vec<u8>, TransportError> {
    fs::read(path).map_err(|source| TransportError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Certificates of a PEM bundle; malformed blocks are skipped.
fn parse_certs(pem: &[u8]) -> Vec<CertificateDer<'static>> {
    rustls_pemfile::certs(&mut &*pem)
        .filter_map(Result::ok)
        .collect()
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TransportError> {
    rustls_pemfile::private_key(&mut &*pem)
        .map_err(TransportError::Pem)?
        .ok_or(TransportError::MissingPrivateKey)
}

fn native_roots() -> RootCertStore {
    let loaded = rustls_native_certs::load_native_certs();
    for error in &loaded.errors {
        warn!(%error, "failed to load a native root certificate");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    debug!(added, ignored, "loaded native root certificates");
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertifiedKey, generate_simple_self_signed};
    use rstest::rstest;
    use std::io::Write;

    fn self_signed() -> CertifiedKey {
        generate_simple_self_signed(vec!["localhost".to_string()]).expect("certificate generated")
    }

    fn pem_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[rstest]
    fn loads_ca_bundle_from_file() {
        let ca = self_signed();
        let file = pem_file(&ca.cert.pem());

        let mut tls = UpstreamTls::new();
        tls.load_ca_cert(file.path()).expect("ca bundle loads");
        assert!(tls.has_custom_roots());
        tls.client_config().expect("config builds");
    }

    #[rstest]
    fn missing_ca_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pem");

        let err = UpstreamTls::new().load_ca_cert(&path).unwrap_err();
        match err {
            TransportError::Read { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    #[case("")]
    #[case("not a certificate")]
    fn ca_bundle_without_certificates_is_rejected(#[case] contents: &str) {
        let mut tls = UpstreamTls::new();
        let err = tls.set_ca_pem(contents.as_bytes()).unwrap_err();
        assert!(matches!(err, TransportError::NoCertificates));
        assert!(!tls.has_custom_roots());
    }

    #[rstest]
    fn pairs_client_identity_in_any_order() {
        let identity = self_signed();
        let cert = pem_file(&identity.cert.pem());
        let key = pem_file(&identity.key_pair.serialize_pem());

        let mut tls = UpstreamTls::new();
        tls.load_client_key(key.path()).unwrap();
        tls.load_client_cert(cert.path()).unwrap();

        let config = tls.client_config().expect("identity pairs");
        assert!(config.client_auth_cert_resolver.has_certs());
    }

    #[rstest]
    fn mismatched_identity_is_rejected() {
        let first = self_signed();
        let second = self_signed();
        let mut tls = UpstreamTls::new();
        tls.set_client_cert_pem(first.cert.pem());
        tls.set_client_key_pem(second.key_pair.serialize_pem());

        let err = tls.client_config().unwrap_err();
        assert!(matches!(err, TransportError::Tls(_)), "unexpected error: {err:?}");
    }

    #[rstest]
    fn no_client_identity_by_default() {
        let config = UpstreamTls::new().client_config().expect("config builds");
        assert!(!config.client_auth_cert_resolver.has_certs());
    }

    #[rstest]
    fn certificate_without_key_is_rejected() {
        let mut tls = UpstreamTls::new();
        tls.set_client_cert_pem(self_signed().cert.pem());

        let err = tls.client_config().unwrap_err();
        assert!(matches!(err, TransportError::IncompleteClientIdentity));
    }

    #[rstest]
    fn key_file_without_key_is_rejected() {
        let identity = self_signed();
        let mut tls = UpstreamTls::new();
        tls.set_client_cert_pem(identity.cert.pem());
        tls.set_client_key_pem(identity.cert.pem());

        let err = tls.client_config().unwrap_err();
        assert!(matches!(err, TransportError::MissingPrivateKey));
    }

    #[rstest]
    fn certificate_file_without_certificate_is_rejected() {
        let identity = self_signed();
        let mut tls = UpstreamTls::new();
        tls.set_client_cert_pem(identity.key_pair.serialize_pem());
        tls.set_client_key_pem(identity.key_pair.serialize_pem());

        let err = tls.client_config().unwrap_err();
        assert!(matches!(err, TransportError::EmptyClientCertificate));
    }
}
