//! Collaborators notified after a package is reconciled.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Event name carried by every sync envelope.
pub const PACKAGE_SYNC_EVENT: &str = "package:sync";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookPayload {
    pub changed_versions: Vec<String>,
}

/// Message passed to the global hook once per reconciled package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookEnvelope {
    pub event: String,
    pub name: String,
    pub payload: HookPayload,
}

impl HookEnvelope {
    pub fn package_sync(name: &str, changed_versions: Vec<String>) -> Self {
        Self {
            event: PACKAGE_SYNC_EVENT.to_string(),
            name: name.to_string(),
            payload: HookPayload { changed_versions },
        }
    }
}

/// Receives an envelope for every reconciled package. The worker awaits the
/// call before the package counts as processed.
#[async_trait]
pub trait GlobalHook: Send + Sync {
    async fn call(&self, envelope: HookEnvelope) -> Result<()>;
}

/// A cache in front of the upstream registry.
#[async_trait]
pub trait UpstreamCache: Send + Sync {
    /// Invalidates or refreshes the cached entry of `name`.
    async fn refresh(&self, name: &str) -> Result<()>;
}

pub type GlobalHookHandle = Arc<dyn GlobalHook>;
pub type UpstreamCacheHandle = Arc<dyn UpstreamCache>;
