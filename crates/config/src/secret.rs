use crate::ConfigError;
use http::HeaderName;
use std::fmt;

/// Shared-secret header requirement for inbound requests.
///
/// The header name is matched case-insensitively, but the spelling it was
/// configured with is kept for messages returned to callers.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    name: HeaderName,
    label: String,
    value: String,
}

impl Secret {
    /// Create a new [`Secret`], validating the header name.
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Result<Self, ConfigError> {
        let label = header.into();
        let name = HeaderName::from_bytes(label.as_bytes()).map_err(|source| {
            ConfigError::SecretHeader {
                value: label.clone(),
                source,
            }
        })?;
        Ok(Self {
            name,
            label,
            value: value.into(),
        })
    }

    /// Header the secret is read from.
    pub const fn header(&self) -> &HeaderName {
        &self.name
    }

    /// Header name as it was configured.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Expected header value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("header", &self.label)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn keeps_configured_spelling() {
        let secret = Secret::new("X-SECRET", "s3cr3t").unwrap();
        assert_eq!(secret.label(), "X-SECRET");
        assert_eq!(secret.header().as_str(), "x-secret");
        assert_eq!(secret.value(), "s3cr3t");
    }

    #[rstest]
    fn debug_output_hides_value() {
        let secret = Secret::new("X-SECRET", "s3cr3t").unwrap();
        let rendered = format!("{secret:?}");
        assert!(rendered.contains("X-SECRET"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[rstest]
    #[case("")]
    #[case("bad header")]
    #[case("x-secret\n")]
    fn rejects_invalid_header_names(#[case] header: &str) {
        let err = Secret::new(header, "value").unwrap_err();
        assert!(matches!(err, ConfigError::SecretHeader { .. }));
    }
}
