//! The upstream registry contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{RegistryError, Result},
    manifest::{PackageDocument, UnpublishRecord},
    user::UpstreamUser,
};

/// Outcome of fetching a package document upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPackage {
    Found(PackageDocument),
    /// The package existed and was fully unpublished.
    Unpublished(UnpublishRecord),
    NotFound,
}

/// Source of package documents, users and tarballs.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch_package(&self, name: &str) -> Result<UpstreamPackage>;

    /// Returns `None` when the user does not exist upstream.
    async fn fetch_user(&self, name: &str) -> Result<Option<UpstreamUser>>;

    async fn fetch_tarball(&self, url: &str) -> Result<Vec<u8>>;

    /// Asks an upstream mirror to sync `name` from its own upstream.
    async fn request_sync(&self, name: &str) -> Result<()>;
}

/// Shared handle to an upstream.
pub type UpstreamHandle = Arc<dyn Upstream>;

/// Interprets a package document response.
///
/// A 404 whose body still describes an unpublish is reported as
/// [`UpstreamPackage::Unpublished`]; any other 404 is
/// [`UpstreamPackage::NotFound`].
pub fn classify_document(name: &str, status: u16, body: &[u8]) -> Result<UpstreamPackage> {
    match status {
        200..=299 => {
            let mut doc: PackageDocument = serde_json::from_slice(body).map_err(|err| {
                RegistryError::MalformedManifest {
                    name: name.to_string(),
                    reason: err.to_string(),
                }
            })?;
            if doc.name.is_empty() {
                doc.name = name.to_string();
            }
            if let Some(record) = doc.unpublished() {
                if doc.versions.is_empty() {
                    return Ok(UpstreamPackage::Unpublished(record));
                }
            }
            Ok(UpstreamPackage::Found(doc))
        }
        404 => {
            let unpublished = serde_json::from_slice::<PackageDocument>(body)
                .ok()
                .and_then(|mut doc| {
                    if doc.name.is_empty() {
                        doc.name = name.to_string();
                    }
                    doc.unpublished()
                });
            Ok(match unpublished {
                Some(record) => UpstreamPackage::Unpublished(record),
                None => UpstreamPackage::NotFound,
            })
        }
        status => Err(RegistryError::FailedToFetchRemote(format!(
            "{name} [{status}]"
        ))),
    }
}
