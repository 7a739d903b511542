use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manifest::{DependencyMap, Dist};

/// A version in the abbreviated install format.
///
/// Only fields an installer needs are carried. Field order is fixed by
/// declaration order, so serializing equal values always yields equal bytes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AbbreviatedVersion {
    pub name: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyMap>,

    #[serde(
        default,
        rename = "optionalDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub optional_dependencies: Option<DependencyMap>,

    #[serde(
        default,
        rename = "devDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub dev_dependencies: Option<Value>,

    #[serde(
        default,
        rename = "bundleDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundle_dependencies: Option<Value>,

    #[serde(
        default,
        rename = "peerDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub peer_dependencies: Option<Value>,

    #[serde(
        default,
        rename = "peerDependenciesMeta",
        skip_serializing_if = "Option::is_none"
    )]
    pub peer_dependencies_meta: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directories: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<Dist>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engines: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Value>,

    #[serde(
        default,
        rename = "_hasShrinkwrap",
        skip_serializing_if = "Option::is_none"
    )]
    pub has_shrinkwrap: Option<bool>,

    #[serde(
        default,
        rename = "hasInstallScript",
        skip_serializing_if = "Option::is_none"
    )]
    pub has_install_script: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<i64>,
}
