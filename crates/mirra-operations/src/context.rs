use std::sync::Arc;

use mirra_backup::{BlobStoreHandle, MemoryBlobStore};
use mirra_config::config::Config;
use mirra_events::{EventSinkHandle, NullSink};
use mirra_registry::UpstreamHandle;
use mirra_store::{MemoryStore, PackageStoreHandle, SyncLogStoreHandle, UserStoreHandle};

use crate::hooks::{GlobalHookHandle, UpstreamCacheHandle};

/// Everything a sync run talks to.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct SyncContext {
    config: Arc<Config>,
    packages: PackageStoreHandle,
    users: UserStoreHandle,
    logs: SyncLogStoreHandle,
    blobs: BlobStoreHandle,
    upstream: UpstreamHandle,
    events: EventSinkHandle,
    hook: Option<GlobalHookHandle>,
    cache: Option<UpstreamCacheHandle>,
}

impl SyncContext {
    pub fn new(
        config: Config,
        packages: PackageStoreHandle,
        users: UserStoreHandle,
        logs: SyncLogStoreHandle,
        blobs: BlobStoreHandle,
        upstream: UpstreamHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            packages,
            users,
            logs,
            blobs,
            upstream,
            events: Arc::new(NullSink),
            hook: None,
            cache: None,
        }
    }

    /// A context backed by a fresh [`MemoryStore`] and [`MemoryBlobStore`].
    pub fn in_memory(config: Config, upstream: UpstreamHandle) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            config,
            store.clone(),
            store.clone(),
            store,
            Arc::new(MemoryBlobStore::new()),
            upstream,
        )
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn with_hook(mut self, hook: GlobalHookHandle) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_cache(mut self, cache: UpstreamCacheHandle) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn packages(&self) -> &PackageStoreHandle {
        &self.packages
    }

    pub fn users(&self) -> &UserStoreHandle {
        &self.users
    }

    pub fn logs(&self) -> &SyncLogStoreHandle {
        &self.logs
    }

    pub fn blobs(&self) -> &BlobStoreHandle {
        &self.blobs
    }

    pub fn upstream(&self) -> &UpstreamHandle {
        &self.upstream
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.events
    }

    pub fn hook(&self) -> Option<&GlobalHookHandle> {
        self.hook.as_ref()
    }

    pub fn cache(&self) -> Option<&UpstreamCacheHandle> {
        self.cache.as_ref()
    }
}
