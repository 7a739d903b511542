use crate::RunId;

/// All event types emitted by a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A run began draining its frontier.
    RunStarted {
        run_id: RunId,
        log_id: Option<String>,
        targets: usize,
    },
    /// A name was dequeued and is being reconciled.
    TargetStarted { run_id: RunId, name: String },
    /// A name was reconciled.
    TargetSynced {
        run_id: RunId,
        name: String,
        changed: usize,
    },
    /// A name was retired without reconciliation.
    TargetSkipped {
        run_id: RunId,
        name: String,
        reason: SkipReason,
    },
    /// Reconciliation of a name failed.
    TargetFailed {
        run_id: RunId,
        name: String,
        error: String,
    },
    /// A dependency discovered while reconciling `parent` joined the frontier.
    DependencyQueued {
        run_id: RunId,
        name: String,
        parent: String,
    },
    /// The frontier drained. Fired exactly once per run.
    RunComplete {
        run_id: RunId,
        successes: usize,
        failures: usize,
    },
    /// Generic log message.
    Log { level: LogLevel, message: String },
}

/// Why a target was retired without touching the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Local-only package, by exact name or scope.
    Private,
    /// Absent upstream (or absent from the backup store during replay).
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl SyncEvent {
    /// Name of the package the event concerns, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            SyncEvent::TargetStarted { name, .. }
            | SyncEvent::TargetSynced { name, .. }
            | SyncEvent::TargetSkipped { name, .. }
            | SyncEvent::TargetFailed { name, .. }
            | SyncEvent::DependencyQueued { name, .. } => Some(name),
            _ => None,
        }
    }
}
