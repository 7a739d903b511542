//! Error types for reconciliation.

use miette::Diagnostic;
use mirra_backup::BackupError;
use mirra_registry::RegistryError;
use mirra_store::StoreError;
use thiserror::Error;

/// Everything that can fail while syncing one package name.
#[derive(Error, Diagnostic, Debug)]
pub enum SyncError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backup(#[from] BackupError),

    #[error("Failed to mirror tarball of {name}@{version}: {reason}")]
    #[diagnostic(
        code(mirra_core::tarball),
        help("The version is retried on the next sync of the package")
    )]
    Tarball {
        name: String,
        version: String,
        reason: String,
    },

    #[error("Sync task for '{0}' panicked")]
    #[diagnostic(code(mirra_core::panicked))]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Whether the failure means "nothing to sync" rather than a real error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Backup(BackupError::NotFound(_)))
    }
}
