use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user document as served by the upstream registry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UpstreamUser {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UpstreamUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
