use mirra_operations::{SyncContext, SyncOptions, SyncSummary, SyncWorker, TargetKind};
use nu_ansi_term::Color::{Green, Red};
use tracing::{error, info};

use crate::utils::Colored;

pub struct SyncArgs {
    pub no_dep: bool,
    pub from_backup: bool,
    pub log_id: Option<String>,
    pub username: Option<String>,
}

/// Syncs `names` and their dependencies. Returns whether every target
/// succeeded.
pub async fn sync_packages(
    ctx: &SyncContext,
    names: Vec<String>,
    args: SyncArgs,
) -> miette::Result<bool> {
    let options = SyncOptions {
        kind: TargetKind::Package,
        username: args.username,
        skip_dependencies: args.no_dep,
        from_backup: args.from_backup,
        log_id: args.log_id,
    };

    let summary = SyncWorker::new(ctx.clone(), names, options)
        .start()
        .wait()
        .await;
    report(&summary);

    Ok(summary.is_success())
}

pub async fn sync_users(ctx: &SyncContext, names: Vec<String>) -> miette::Result<bool> {
    let options = SyncOptions {
        kind: TargetKind::User,
        ..Default::default()
    };

    let summary = SyncWorker::new(ctx.clone(), names, options)
        .start()
        .wait()
        .await;
    report(&summary);

    Ok(summary.is_success())
}

fn report(summary: &SyncSummary) {
    for (name, versions) in &summary.changed {
        if !versions.is_empty() {
            info!("{name}: {}", versions.join(", "));
        }
    }

    for (name, reason) in &summary.errors {
        error!("{name}: {reason}");
    }

    info!(
        "{} succeeded, {} failed",
        Colored(Green, summary.successes.len()),
        Colored(Red, summary.failures.len())
    );
}
