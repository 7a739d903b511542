//! Document reconciliation for the mirra registry mirror.
//!
//! Syncing one package is split into a pure diff and its application:
//!
//! 1. [`load_local`] reads what the store holds for a name
//! 2. [`reconcile`] compares it with the upstream document and produces a
//!    [`ReconcilePlan`]
//! 3. [`apply`] mirrors tarballs and writes the plan to the store
//!
//! [`render`] turns local state back into the full or abbreviated payload
//! served to clients, with an entity tag that only moves when the payload
//! does.

pub mod apply;
pub mod error;
pub mod normalize;
pub mod projection;
pub mod reconcile;
pub mod view;

pub use apply::{apply, apply_unpublish, ApplyReport, TarballMirror};
pub use error::{Result, SyncError};
pub use normalize::normalize_version;
pub use projection::abbreviate;
pub use reconcile::{reconcile, DeprecationChange, LocalState, ReconcileOptions, ReconcilePlan};
pub use view::{build_document, load_local, render, LocalDocument, RenderedDocument, Representation};
