//! Mirroring of upstream user accounts.

use chrono::Utc;
use mirra_store::LocalUser;
use tracing::{debug, info};

use crate::{context::SyncContext, error::Result};

/// What [`reconcile_user`] did to the local record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserOutcome {
    /// A shadow record was written or refreshed.
    pub upserted: bool,
    /// A shadow record was deleted.
    pub deleted: bool,
}

/// Brings the local record of `name` in line with upstream.
///
/// A user present upstream gets a mirrored shadow record. A user gone
/// upstream loses its shadow record, unless the local account carries
/// credentials, in which case it was registered here and is left alone.
pub async fn reconcile_user(ctx: &SyncContext, name: &str) -> Result<UserOutcome> {
    let existing = ctx.users().get_user(name).await?;

    let Some(upstream) = ctx.upstream().fetch_user(name).await? else {
        return match existing {
            Some(user) if user.has_credentials() => {
                debug!(name, "user gone upstream, keeping registered account");
                Ok(UserOutcome::default())
            }
            Some(_) => {
                let deleted = ctx.users().delete_user(name).await?;
                info!(name, "removed mirrored user gone upstream");
                Ok(UserOutcome {
                    upserted: false,
                    deleted,
                })
            }
            None => Ok(UserOutcome::default()),
        };
    };

    let user = match existing {
        Some(mut user) if user.has_credentials() => {
            user.upstream = serde_json::to_value(&upstream).ok();
            user.synced_at = Some(Utc::now());
            user
        }
        _ => LocalUser::mirrored(&upstream),
    };
    ctx.users().save_user(user).await?;
    debug!(name, "user mirrored");

    Ok(UserOutcome {
        upserted: true,
        deleted: false,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mirra_config::config::Config;
    use mirra_registry::{MemoryUpstream, UpstreamUser};

    use super::*;

    fn context(upstream: Arc<MemoryUpstream>) -> SyncContext {
        SyncContext::in_memory(Config::default_config(), upstream)
    }

    #[tokio::test]
    async fn test_mirrored_user_follows_upstream() {
        let upstream = Arc::new(MemoryUpstream::new());
        upstream.put_user(UpstreamUser::new("fengmk2"));
        let ctx = context(upstream.clone());

        let outcome = reconcile_user(&ctx, "fengmk2").await.unwrap();
        assert!(outcome.upserted);
        assert!(ctx.users().get_user("fengmk2").await.unwrap().is_some());

        upstream.remove_user("fengmk2");
        let outcome = reconcile_user(&ctx, "fengmk2").await.unwrap();
        assert!(outcome.deleted);
        assert!(ctx.users().get_user("fengmk2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_registered_user_is_kept() {
        let upstream = Arc::new(MemoryUpstream::new());
        let ctx = context(upstream.clone());
        ctx.users()
            .save_user(LocalUser {
                name: "existsuser".into(),
                password_sha: Some("0".into()),
                salt: Some("0".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = reconcile_user(&ctx, "existsuser").await.unwrap();
        assert!(!outcome.deleted);

        upstream.put_user(UpstreamUser::new("existsuser"));
        reconcile_user(&ctx, "existsuser").await.unwrap();
        let user = ctx.users().get_user("existsuser").await.unwrap().unwrap();
        assert!(user.has_credentials());
        assert!(user.upstream.is_some());
    }

    #[tokio::test]
    async fn test_unknown_user_is_noop() {
        let ctx = context(Arc::new(MemoryUpstream::new()));
        assert_eq!(
            reconcile_user(&ctx, "ghost").await.unwrap(),
            UserOutcome::default()
        );
    }
}
