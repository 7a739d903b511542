//! In-process implementation of every store contract.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use mirra_registry::{AbbreviatedVersion, DistTags, UnpublishRecord, VersionRecord};

use crate::{
    error::Result,
    model::{LocalUser, PackageState},
    traits::{PackageStore, SyncLogStore, UserStore},
};

#[derive(Default)]
struct Inner {
    packages: HashMap<String, PackageState>,
    users: HashMap<String, LocalUser>,
    logs: HashMap<String, Vec<String>>,
}

/// Volatile store backing the CLI's `--ephemeral` mode and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_package<R>(&self, name: &str, f: impl FnOnce(&PackageState) -> R) -> R {
        let inner = self.lock();
        match inner.packages.get(name) {
            Some(state) => f(state),
            None => f(&PackageState::default()),
        }
    }

    fn update_package<R>(&self, name: &str, f: impl FnOnce(&mut PackageState) -> R) -> R {
        let mut inner = self.lock();
        let state = inner.packages.entry(name.to_string()).or_default();
        let out = f(&mut *state);
        if state.is_empty() {
            inner.packages.remove(name);
        }
        out
    }

    /// Snapshot of everything stored for `name`.
    pub fn package_state(&self, name: &str) -> PackageState {
        self.read_package(name, Clone::clone)
    }
}

#[async_trait]
impl PackageStore for MemoryStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.read_package(name, |state| !state.versions.is_empty()))
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<VersionRecord>> {
        Ok(self.read_package(name, |state| state.versions.values().cloned().collect()))
    }

    async fn save_version(&self, record: VersionRecord) -> Result<()> {
        let name = record.name.clone();
        self.update_package(&name, |state| {
            state.versions.insert(record.version.clone(), record);
        });
        Ok(())
    }

    async fn remove_versions(&self, name: &str, versions: &[String]) -> Result<()> {
        self.update_package(name, |state| {
            for version in versions {
                state.versions.remove(version);
                state.abbreviated.remove(version);
            }
        });
        Ok(())
    }

    async fn list_abbreviated(&self, name: &str) -> Result<Vec<AbbreviatedVersion>> {
        Ok(self.read_package(name, |state| state.abbreviated.values().cloned().collect()))
    }

    async fn save_abbreviated(&self, record: AbbreviatedVersion) -> Result<()> {
        let name = record.name.clone();
        self.update_package(&name, |state| {
            state.abbreviated.insert(record.version.clone(), record);
        });
        Ok(())
    }

    async fn list_tags(&self, name: &str) -> Result<DistTags> {
        Ok(self.read_package(name, |state| state.tags.clone()))
    }

    async fn set_tag(&self, name: &str, tag: &str, version: &str) -> Result<()> {
        self.update_package(name, |state| {
            state.tags.insert(tag.to_string(), version.to_string());
        });
        Ok(())
    }

    async fn remove_tag(&self, name: &str, tag: &str) -> Result<()> {
        self.update_package(name, |state| {
            state.tags.remove(tag);
        });
        Ok(())
    }

    async fn get_unpublished(&self, name: &str) -> Result<Option<UnpublishRecord>> {
        Ok(self.read_package(name, |state| state.unpublished.clone()))
    }

    async fn save_unpublished(&self, record: UnpublishRecord) -> Result<()> {
        let name = record.name.clone();
        self.update_package(&name, |state| state.unpublished = Some(record));
        Ok(())
    }

    async fn clear_unpublished(&self, name: &str) -> Result<()> {
        self.update_package(name, |state| state.unpublished = None);
        Ok(())
    }

    async fn remove_package(&self, name: &str) -> Result<()> {
        self.update_package(name, |state| {
            state.versions.clear();
            state.abbreviated.clear();
            state.tags.clear();
        });
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, name: &str) -> Result<Option<LocalUser>> {
        Ok(self.lock().users.get(name).cloned())
    }

    async fn save_user(&self, user: LocalUser) -> Result<()> {
        self.lock().users.insert(user.name.clone(), user);
        Ok(())
    }

    async fn delete_user(&self, name: &str) -> Result<bool> {
        Ok(self.lock().users.remove(name).is_some())
    }
}

#[async_trait]
impl SyncLogStore for MemoryStore {
    async fn append(&self, log_id: &str, line: &str) -> Result<()> {
        self.lock()
            .logs
            .entry(log_id.to_string())
            .or_default()
            .push(line.to_string());
        Ok(())
    }

    async fn read(&self, log_id: &str) -> Result<Vec<String>> {
        Ok(self.lock().logs.get(log_id).cloned().unwrap_or_default())
    }
}
