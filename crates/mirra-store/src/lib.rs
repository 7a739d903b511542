//! Local storage contracts for the mirra registry mirror.
//!
//! The sync engine only ever talks to the [`PackageStore`], [`UserStore`] and
//! [`SyncLogStore`] traits. [`MemoryStore`] keeps everything in process;
//! [`FileStore`] persists JSON files under a data directory.

pub mod error;
pub mod file;
pub mod memory;
pub mod model;
pub mod traits;

pub use error::{ErrorContext, Result, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use model::{LocalUser, PackageState};
pub use traits::{
    PackageStore, PackageStoreHandle, SyncLogStore, SyncLogStoreHandle, UserStore,
    UserStoreHandle,
};
