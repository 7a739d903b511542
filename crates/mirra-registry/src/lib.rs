//! Upstream registry access for the mirra registry mirror.
//!
//! This crate defines the package document model shared by every other
//! crate, the [`Upstream`] contract through which documents, users and
//! tarballs are fetched, and two implementations of it:
//!
//! - [`HttpUpstream`]: talks to a real registry over HTTP
//! - [`MemoryUpstream`]: scripted contents, for offline runs and tests
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use mirra_registry::{HttpUpstream, Upstream, UpstreamPackage};
//!
//! async fn latest(name: &str) -> mirra_registry::Result<Option<String>> {
//!     let upstream = HttpUpstream::new("https://registry.npmjs.org", Duration::from_secs(30))?;
//!     Ok(match upstream.fetch_package(name).await? {
//!         UpstreamPackage::Found(doc) => doc.dist_tags.get("latest").cloned(),
//!         _ => None,
//!     })
//! }
//! ```

pub mod abbreviated;
pub mod error;
pub mod http;
pub mod manifest;
pub mod memory;
pub mod upstream;
pub mod user;

pub use abbreviated::AbbreviatedVersion;
pub use error::{RegistryError, Result};
pub use http::HttpUpstream;
pub use manifest::{
    DependencyMap, Dist, DistTags, PackageDocument, PackageTime, UnpublishRecord, VersionRecord,
};
pub use memory::MemoryUpstream;
pub use upstream::{classify_document, Upstream, UpstreamHandle, UpstreamPackage};
pub use user::UpstreamUser;
