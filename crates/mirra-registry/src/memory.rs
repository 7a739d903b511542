//! Scripted in-memory upstream.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;

use crate::{
    error::{RegistryError, Result},
    manifest::{PackageDocument, UnpublishRecord},
    upstream::{Upstream, UpstreamPackage},
    user::UpstreamUser,
};

#[derive(Default)]
struct State {
    packages: HashMap<String, UpstreamPackage>,
    users: HashMap<String, UpstreamUser>,
    tarballs: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    fetches: HashMap<String, usize>,
    sync_requests: Vec<String>,
}

/// An [`Upstream`] whose contents are set up by the caller.
///
/// Names marked with [`MemoryUpstream::fail`] return a transient error.
#[derive(Default)]
pub struct MemoryUpstream {
    state: Mutex<State>,
}

impl MemoryUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put_document(&self, doc: PackageDocument) {
        self.state()
            .packages
            .insert(doc.name.clone(), UpstreamPackage::Found(doc));
    }

    pub fn put_unpublished(&self, record: UnpublishRecord) {
        self.state()
            .packages
            .insert(record.name.clone(), UpstreamPackage::Unpublished(record));
    }

    pub fn remove(&self, name: &str) {
        self.state().packages.remove(name);
    }

    pub fn put_user(&self, user: UpstreamUser) {
        self.state().users.insert(user.name.clone(), user);
    }

    pub fn remove_user(&self, name: &str) {
        self.state().users.remove(name);
    }

    pub fn put_tarball(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.state().tarballs.insert(url.into(), bytes);
    }

    pub fn fail(&self, name: impl Into<String>) {
        self.state().failing.insert(name.into());
    }

    /// How many times `name`'s document was requested.
    pub fn fetch_count(&self, name: &str) -> usize {
        self.state().fetches.get(name).copied().unwrap_or(0)
    }

    pub fn sync_requests(&self) -> Vec<String> {
        self.state().sync_requests.clone()
    }
}

#[async_trait]
impl Upstream for MemoryUpstream {
    async fn fetch_package(&self, name: &str) -> Result<UpstreamPackage> {
        let mut state = self.state();
        *state.fetches.entry(name.to_string()).or_default() += 1;

        if state.failing.contains(name) {
            return Err(RegistryError::FailedToFetchRemote(format!("{name} [503]")));
        }
        Ok(state
            .packages
            .get(name)
            .cloned()
            .unwrap_or(UpstreamPackage::NotFound))
    }

    async fn fetch_user(&self, name: &str) -> Result<Option<UpstreamUser>> {
        let state = self.state();
        if state.failing.contains(name) {
            return Err(RegistryError::FailedToFetchRemote(format!(
                "user {name} [503]"
            )));
        }
        Ok(state.users.get(name).cloned())
    }

    async fn fetch_tarball(&self, url: &str) -> Result<Vec<u8>> {
        self.state()
            .tarballs
            .get(url)
            .cloned()
            .ok_or_else(|| RegistryError::FailedToFetchRemote(format!("{url} [404]")))
    }

    async fn request_sync(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.sync_requests.push(name.to_string());
        if state.failing.contains(name) {
            return Err(RegistryError::FailedToFetchRemote(format!(
                "sync {name} [503]"
            )));
        }
        Ok(())
    }
}
