//! Error types for the store crate.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum StoreError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(
        code(mirra_store::io),
        help("Check file permissions and disk space")
    )]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Corrupted record at {path}: {reason}")]
    #[diagnostic(
        code(mirra_store::corrupted),
        help("Remove the file and sync the package again")
    )]
    Corrupted { path: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(mirra_store::json))]
    JsonError(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    #[diagnostic(code(mirra_store::backend))]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            StoreError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
