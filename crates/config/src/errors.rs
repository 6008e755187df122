use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or resolving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying IO failure.
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        /// Path of the configuration file that could not be read.
        path: PathBuf,
        /// Underlying IO error produced while reading the file.
        source: std::io::Error,
    },
    /// Failure to parse TOML.
    #[error("unable to parse config file as TOML: {source}")]
    TomlParse {
        #[from]
        /// Error returned by the TOML parser.
        source: toml::de::Error,
    },
    /// No target was supplied by any configuration source.
    #[error("target is empty")]
    MissingTarget,
    /// The target could not be parsed as a URI.
    #[error("target '{value}' is invalid: {source}")]
    TargetUrl {
        /// The target URL provided by the user.
        value: String,
        /// Error returned while parsing the URI.
        source: http::uri::InvalidUri,
    },
    /// The target parsed but lacks an `http`/`https` scheme or an authority.
    #[error("target '{value}' must be an absolute http or https URL")]
    TargetNotAbsolute {
        /// The target URL provided by the user.
        value: String,
    },
    /// The listen address could not be resolved.
    #[error("invalid bind address '{value}': {source}")]
    BindAddress {
        /// The `host:port` pair supplied by the user.
        value: String,
        /// Error returned while resolving the socket address.
        source: std::io::Error,
    },
    /// The secret header name is not a valid HTTP header name.
    #[error("invalid secret header name '{value}': {source}")]
    SecretHeader {
        /// The offending header name.
        value: String,
        /// Error returned while parsing the header name.
        source: http::header::InvalidHeaderName,
    },
}
