//! Durable backup of sync state.
//!
//! After a package is reconciled its version records, dist-tags and unpublish
//! state are mirrored into a [`BlobStore`] with one blob per record. A later
//! run can rebuild the package document from those blobs with [`restore`]
//! without contacting the upstream registry.

pub mod blob;
pub mod error;
pub mod fs;
pub mod keys;
pub mod memory;
pub mod restore;
pub mod save;

pub use blob::{BlobStore, BlobStoreHandle};
pub use error::{ignore_missing, BackupError, ErrorContext, Result};
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use restore::{restore, restore_tag, Restored};
pub use save::{save_backup_files, save_unpublish_record, BackupSummary};
