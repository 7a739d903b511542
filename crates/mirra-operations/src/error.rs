use miette::Diagnostic;
use mirra_backup::BackupError;
use mirra_core::SyncError;
use mirra_registry::RegistryError;
use mirra_store::StoreError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum OperationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Sync(#[from] SyncError),

    #[error("Global hook failed for '{name}': {reason}")]
    #[diagnostic(code(mirra_operations::hook))]
    Hook { name: String, reason: String },

    #[error("Upstream cache refresh failed for '{name}': {reason}")]
    #[diagnostic(code(mirra_operations::cache))]
    Cache { name: String, reason: String },

    #[error("Failed to sync '{name}': {reason}")]
    #[diagnostic(
        code(mirra_operations::failed),
        help("Run the sync again with RUST_LOG=debug for details")
    )]
    Failed { name: String, reason: String },
}

impl From<RegistryError> for OperationError {
    fn from(err: RegistryError) -> Self {
        OperationError::Sync(err.into())
    }
}

impl From<StoreError> for OperationError {
    fn from(err: StoreError) -> Self {
        OperationError::Sync(err.into())
    }
}

impl From<BackupError> for OperationError {
    fn from(err: BackupError) -> Self {
        OperationError::Sync(err.into())
    }
}

pub type Result<T> = std::result::Result<T, OperationError>;
