//! Keyed in-process locks for serializing work on a single name.
//!
//! Holders asking for the same name wait on each other while distinct names
//! never contend. A registry entry lives only as long as someone holds or
//! waits for it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Entries = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// A registry of per-name async mutexes.
///
/// Cloning a `NameLocks` shares the same registry.
#[derive(Clone, Default)]
pub struct NameLocks {
    entries: Arc<Entries>,
}

/// Exclusive hold on one name, released on drop.
pub struct NameGuard {
    name: String,
    entries: Arc<Entries>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.entry(name.to_string()).or_default().clone()
    }

    /// Acquire the lock for `name`, waiting for any current holder.
    pub async fn lock(&self, name: &str) -> NameGuard {
        let guard = self.entry(name).lock_owned().await;
        NameGuard {
            name: name.to_string(),
            entries: self.entries.clone(),
            guard: Some(guard),
        }
    }

    /// Try to acquire the lock for `name` without waiting.
    ///
    /// Returns `None` if another holder currently owns the name.
    pub fn try_lock(&self, name: &str) -> Option<NameGuard> {
        let entry = self.entry(name);
        match entry.try_lock_owned() {
            Ok(guard) => {
                Some(NameGuard {
                    name: name.to_string(),
                    entries: self.entries.clone(),
                    guard: Some(guard),
                })
            }
            Err(_) => {
                self.prune(name);
                None
            }
        }
    }

    /// Whether some holder currently owns `name`.
    pub fn is_locked(&self, name: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(name)
            .is_some_and(|entry| entry.try_lock().is_err())
    }

    /// Number of names with a live holder or waiter.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self, name: &str) {
        prune_entry(&self.entries, name);
    }
}

fn prune_entry(entries: &Entries, name: &str) {
    let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
    // Only the registry itself references the mutex: nobody holds or waits.
    if entries
        .get(name)
        .is_some_and(|entry| Arc::strong_count(entry) == 1)
    {
        entries.remove(name);
    }
}

impl NameGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune_entry(&self.entries, &self.name);
    }
}
