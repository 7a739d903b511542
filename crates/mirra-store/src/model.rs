use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mirra_registry::{AbbreviatedVersion, DistTags, UnpublishRecord, UpstreamUser, VersionRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything stored locally for one package name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PackageState {
    #[serde(default)]
    pub versions: BTreeMap<String, VersionRecord>,

    #[serde(default)]
    pub abbreviated: BTreeMap<String, AbbreviatedVersion>,

    #[serde(default)]
    pub tags: DistTags,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpublished: Option<UnpublishRecord>,
}

impl PackageState {
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
            && self.abbreviated.is_empty()
            && self.tags.is_empty()
            && self.unpublished.is_none()
    }
}

/// A local user account.
///
/// Accounts registered directly against this mirror carry credential
/// material; shadows of upstream users do not.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LocalUser {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_sha: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,

    /// Upstream user document this shadow was mirrored from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl LocalUser {
    /// A shadow record for an upstream user.
    pub fn mirrored(user: &UpstreamUser) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            upstream: serde_json::to_value(user).ok(),
            synced_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Whether the account was registered locally with a password.
    pub fn has_credentials(&self) -> bool {
        self.password_sha.as_deref().is_some_and(|s| !s.is_empty())
            || self.salt.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirrored_user_has_no_credentials() {
        let mut upstream = UpstreamUser::new("fengmk2");
        upstream.email = Some("fengmk2@example.com".into());

        let user = LocalUser::mirrored(&upstream);
        assert_eq!(user.email.as_deref(), Some("fengmk2@example.com"));
        assert!(!user.has_credentials());
        assert!(user.upstream.is_some());
    }

    #[test]
    fn test_registered_user_has_credentials() {
        let user = LocalUser {
            name: "existsuser".into(),
            password_sha: Some("0".into()),
            salt: Some("0".into()),
            ..Default::default()
        };
        assert!(user.has_credentials());

        let user = LocalUser {
            name: "blank".into(),
            password_sha: Some(String::new()),
            ..Default::default()
        };
        assert!(!user.has_credentials());
    }
}
