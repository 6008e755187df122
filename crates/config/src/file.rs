use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Representation of the on-disk `.tether.toml` configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Upstream every request is forwarded to.
    pub target: Option<String>,
    /// Host the proxy listens on.
    pub host: Option<String>,
    /// Port the proxy listens on.
    pub port: Option<u16>,
    /// Log every request.
    pub debug: Option<bool>,
    /// Value required in the secret header.
    pub secret: Option<String>,
    /// Path segment stripped from request paths.
    pub base_path: Option<String>,
    /// CA bundle trusted for the upstream.
    pub ca_cert: Option<PathBuf>,
    /// Client certificate presented to the upstream.
    pub client_cert: Option<PathBuf>,
    /// Private key for `client_cert`.
    pub client_key: Option<PathBuf>,
}

/// Parse and load the configuration file, returning `Ok(None)` when it is missing.
pub fn load_file(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: FileConfig =
        toml::from_str(&contents).map_err(|source| ConfigError::TomlParse { source })?;
    Ok(Some(parsed))
}
