use std::sync::mpsc::Receiver;

use mirra_events::{LogLevel, SkipReason, SyncEvent};
use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};
use tracing::{debug, error, info, warn};

use crate::utils::{Colored, Icons};

/// Owns the thread that prints run events.
///
/// Drop every [`SyncContext`](mirra_operations::SyncContext) clone before
/// calling [`finish`](ProgressGuard::finish); the thread exits once the
/// channel's senders are gone.
pub struct ProgressGuard {
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ProgressGuard {
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

pub fn spawn_event_handler(receiver: Receiver<SyncEvent>) -> ProgressGuard {
    let handle = std::thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            handle_event(event);
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}

fn handle_event(event: SyncEvent) {
    match event {
        SyncEvent::RunStarted {
            run_id,
            log_id,
            targets,
        } => {
            match log_id {
                Some(log_id) => {
                    debug!("run {run_id} started with {targets} target(s), log {log_id}")
                }
                None => debug!("run {run_id} started with {targets} target(s)"),
            }
        }
        SyncEvent::TargetStarted { name, .. } => {
            debug!("{} {}", Icons::ARROW, Colored(Cyan, &name));
        }
        SyncEvent::TargetSynced { name, changed, .. } => {
            if changed == 0 {
                info!("{} {} up to date", Colored(Green, Icons::CHECK), name);
            } else {
                info!(
                    "{} {} {} version(s) reconciled",
                    Colored(Green, Icons::CHECK),
                    name,
                    changed
                );
            }
        }
        SyncEvent::TargetSkipped { name, reason, .. } => {
            let reason = match reason {
                SkipReason::Private => "private package",
                SkipReason::NotFound => "not found",
            };
            info!("{} {} skipped ({reason})", Colored(Yellow, Icons::SKIP), name);
        }
        SyncEvent::TargetFailed { name, error, .. } => {
            error!("{} {}: {error}", Colored(Red, Icons::CROSS), name);
        }
        SyncEvent::DependencyQueued { name, parent, .. } => {
            debug!("queued {name} (dependency of {parent})");
        }
        SyncEvent::RunComplete {
            successes,
            failures,
            ..
        } => {
            debug!("run complete: {successes} success(es), {failures} failure(s)");
        }
        SyncEvent::Log { level, message } => {
            match level {
                LogLevel::Debug => debug!("{message}"),
                LogLevel::Info => info!("{message}"),
                LogLevel::Warning => warn!("{message}"),
                LogLevel::Error => error!("{message}"),
            }
        }
    }
}
