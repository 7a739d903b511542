//! Error types for the registry crate.

use miette::Diagnostic;
use mirra_utils::error::NameError;
use thiserror::Error;

/// Errors that can occur while talking to the upstream registry or decoding
/// its documents.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    #[diagnostic(
        code(mirra_registry::http),
        help("Check your network connection and the upstream registry URL")
    )]
    UreqError(#[from] ureq::Error),

    #[error("Failed to fetch from upstream: {0}")]
    #[diagnostic(
        code(mirra_registry::fetch_remote),
        help("The upstream registry may be unavailable; the name can be retried later")
    )]
    FailedToFetchRemote(String),

    #[error("Malformed manifest for '{name}': {reason}")]
    #[diagnostic(
        code(mirra_registry::malformed_manifest),
        help("The upstream document is not a valid package document")
    )]
    MalformedManifest { name: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(mirra_registry::json))]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    #[diagnostic(
        code(mirra_registry::invalid_url),
        help("Ensure the URL is valid and properly formatted")
    )]
    InvalidUrl(String),

    #[error(transparent)]
    #[diagnostic(
        code(mirra_registry::invalid_name),
        help("Package names are lowercase, URL-safe and at most 214 characters")
    )]
    InvalidName(#[from] NameError),

    #[error("Upstream task failed: {0}")]
    #[diagnostic(code(mirra_registry::task))]
    TaskFailed(String),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RegistryError::UreqError(_)
                | RegistryError::FailedToFetchRemote(_)
                | RegistryError::TaskFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::InvalidUrl("bad-url".to_string());
        assert_eq!(err.to_string(), "Invalid URL: bad-url");

        let err = RegistryError::MalformedManifest {
            name: "pedding".into(),
            reason: "missing versions".into(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed manifest for 'pedding': missing versions"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(RegistryError::FailedToFetchRemote("503".into()).is_transient());
        assert!(!RegistryError::MalformedManifest {
            name: "a".into(),
            reason: "b".into()
        }
        .is_transient());
    }
}
