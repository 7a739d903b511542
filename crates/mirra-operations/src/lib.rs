//! Sync runs for the mirra registry mirror.
//!
//! [`SyncWorker`] drives a run over package or user names against the
//! collaborators held by a [`SyncContext`]. Frontends observe progress through
//! the context's event sink and the run's [`SyncHandle`].

pub mod context;
pub mod error;
pub mod hooks;
pub mod user;
pub mod worker;

pub use context::SyncContext;
pub use error::{OperationError, Result};
pub use hooks::{
    GlobalHook, GlobalHookHandle, HookEnvelope, HookPayload, UpstreamCache, UpstreamCacheHandle,
    PACKAGE_SYNC_EVENT,
};
pub use user::{reconcile_user, UserOutcome};
pub use worker::{SyncHandle, SyncOptions, SyncSummary, SyncWorker, TargetKind};
