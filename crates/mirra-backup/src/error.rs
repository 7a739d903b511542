//! Error types for the backup crate.

use miette::Diagnostic;
use mirra_store::StoreError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum BackupError {
    /// The blob store holds nothing at this key.
    #[error("Backup key not found: {0}")]
    #[diagnostic(code(mirra_backup::key_missing))]
    KeyMissing(String),

    /// Nothing restorable is stored for this package.
    #[error("No backup found for '{0}'")]
    #[diagnostic(
        code(mirra_backup::not_found),
        help("Sync the package from upstream with backups enabled first")
    )]
    NotFound(String),

    #[error("Invalid backup key '{0}'")]
    #[diagnostic(
        code(mirra_backup::invalid_key),
        help("Keys are '/'-separated and may not contain empty, '.' or '..' segments")
    )]
    InvalidKey(String),

    #[error("Corrupted backup record at '{key}': {reason}")]
    #[diagnostic(
        code(mirra_backup::corrupted),
        help("Remove the record and sync the package from upstream again")
    )]
    Corrupted { key: String, reason: String },

    #[error("Error while {action}: {source}")]
    #[diagnostic(
        code(mirra_backup::io),
        help("Check permissions and free space of the backup directory")
    )]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(mirra_backup::json))]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, BackupError>;

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
            BackupError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

/// Treats a missing key as success. Used where removal must be idempotent.
pub fn ignore_missing(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(BackupError::KeyMissing(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_missing() {
        assert!(ignore_missing(Ok(())).unwrap());
        assert!(!ignore_missing(Err(BackupError::KeyMissing("k".into()))).unwrap());
        assert!(matches!(
            ignore_missing(Err(BackupError::InvalidKey("..".into()))),
            Err(BackupError::InvalidKey(_))
        ));
    }
}
