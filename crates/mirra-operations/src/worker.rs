//! Sync runs over a frontier of package or user names.
//!
//! A [`SyncWorker`] owns one run. Names are pulled from its queue and
//! reconciled with bounded parallelism; dependencies discovered along the way
//! are pushed back onto the same queue. The run ends once the queue is empty
//! and nothing is in flight, at which point every [`SyncHandle`] resolves
//! with the final [`SyncSummary`].

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, LazyLock, Mutex, MutexGuard, PoisonError,
    },
};

use chrono::{SecondsFormat, Utc};
use mirra_backup::{restore, save_backup_files, save_unpublish_record, BackupError, Restored};
use mirra_config::config::SyncMode;
use mirra_core::{
    apply, apply_unpublish, load_local, reconcile, ReconcileOptions, SyncError, TarballMirror,
};
use mirra_events::{RunId, SkipReason, SyncEvent};
use mirra_registry::UpstreamPackage;
use mirra_utils::lock::NameLocks;
use tokio::{
    sync::{watch, Notify, Semaphore},
    task::{Id, JoinSet},
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    context::SyncContext,
    error::{OperationError, Result},
    hooks::HookEnvelope,
    user::{reconcile_user, UserOutcome},
};

/// Names currently being reconciled by any worker in this process.
static SYNC_LOCKS: LazyLock<NameLocks> = LazyLock::new(NameLocks::new);

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetKind {
    #[default]
    Package,
    User,
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub kind: TargetKind,
    /// Who asked for the run.
    pub username: Option<String>,
    pub skip_dependencies: bool,
    /// Rebuild documents from backup records instead of fetching upstream.
    pub from_backup: bool,
    /// Identifier the run's log lines are stored under.
    pub log_id: Option<String>,
}

/// Final state of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub successes: Vec<String>,
    pub failures: Vec<String>,
    /// Versions whose record was written, per package.
    pub changed: BTreeMap<String, Vec<String>>,
    /// Versions changed, repaired or removed, per name.
    pub reconciled: BTreeMap<String, usize>,
    pub errors: BTreeMap<String, String>,
}

impl SyncSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolves when the run it was taken from completes.
pub struct SyncHandle {
    rx: watch::Receiver<Option<SyncSummary>>,
}

impl SyncHandle {
    pub async fn wait(mut self) -> SyncSummary {
        let ready = self
            .rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|summary| summary.clone());
        ready
            .or_else(|| self.rx.borrow().clone())
            .unwrap_or_default()
    }

    /// The summary, if the run already completed.
    pub fn summary(&self) -> Option<SyncSummary> {
        self.rx.borrow().clone()
    }
}

#[derive(Debug)]
enum TargetOutcome {
    Synced {
        changed: Vec<String>,
        reconciled: usize,
    },
    Unpublished {
        removed: usize,
    },
    Skipped(SkipReason),
    User(UserOutcome),
}

#[derive(Default)]
struct RunState {
    queue: VecDeque<String>,
    known: HashSet<String>,
    in_progress: HashSet<String>,
    ended: bool,
    summary: SyncSummary,
}

struct Inner {
    ctx: SyncContext,
    options: SyncOptions,
    run_id: RunId,
    state: Mutex<RunState>,
    wake: Notify,
    started: AtomicBool,
    done: watch::Sender<Option<SyncSummary>>,
}

#[derive(Clone)]
pub struct SyncWorker {
    inner: Arc<Inner>,
}

impl SyncWorker {
    pub fn new<I, S>(ctx: SyncContext, names: I, options: SyncOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = RunState::default();
        for name in names {
            let name = name.into();
            if state.known.insert(name.clone()) {
                state.queue.push_back(name);
            }
        }

        let (done, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                ctx,
                options,
                run_id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(state),
                wake: Notify::new(),
                started: AtomicBool::new(false),
                done,
            }),
        }
    }

    /// Syncs one package without dependency expansion and returns how many
    /// versions were changed, repaired or removed.
    ///
    /// A package unknown upstream yields 0.
    pub async fn sync(ctx: &SyncContext, name: &str, username: Option<String>) -> Result<usize> {
        let worker = SyncWorker::new(
            ctx.clone(),
            [name],
            SyncOptions {
                username,
                skip_dependencies: true,
                ..Default::default()
            },
        );
        let summary = worker.start().wait().await;

        if let Some(reason) = summary.errors.get(name) {
            return Err(OperationError::Failed {
                name: name.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(summary.reconciled.get(name).copied().unwrap_or(0))
    }

    pub fn run_id(&self) -> RunId {
        self.inner.run_id
    }

    pub fn options(&self) -> &SyncOptions {
        &self.inner.options
    }

    /// Starts draining the queue in the background.
    ///
    /// Calling it again returns another handle to the same run.
    pub fn start(&self) -> SyncHandle {
        let handle = self.subscribe();
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return handle;
        }

        let span = info_span!(
            "sync",
            run_id = self.inner.run_id,
            log_id = self.inner.options.log_id.as_deref()
        );
        let worker = self.clone();
        tokio::spawn(async move { worker.run().await }.instrument(span));
        handle
    }

    pub fn subscribe(&self) -> SyncHandle {
        SyncHandle {
            rx: self.inner.done.subscribe(),
        }
    }

    /// Adds `name` to the queue.
    ///
    /// Returns `false` when the name was already seen in this run or the run
    /// has ended.
    pub fn enqueue(&self, name: &str) -> bool {
        let queued = {
            let mut state = self.state();
            if state.ended || !state.known.insert(name.to_string()) {
                false
            } else {
                state.queue.push_back(name.to_string());
                true
            }
        };
        if queued {
            self.inner.wake.notify_one();
        }
        queued
    }

    /// Asks the upstream to sync `name` from its own upstream first. Returns
    /// whether the request succeeded; failures are only logged.
    pub async fn sync_upstream(&self, name: &str) -> bool {
        match self.inner.ctx.upstream().request_sync(name).await {
            Ok(()) => {
                debug!(name, "upstream sync requested");
                true
            }
            Err(err) => {
                warn!(name, error = %err, "upstream sync request failed");
                false
            }
        }
    }

    /// Tells the upstream cache, if any, that `name` changed. Failures are
    /// only logged.
    pub async fn refresh_upstream_cache(&self, name: &str) {
        let Some(cache) = self.inner.ctx.cache() else {
            return;
        };
        if let Err(err) = cache.refresh(name).await {
            warn!(name, error = %err, "upstream cache refresh failed");
        }
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SyncEvent) {
        self.inner.ctx.events().emit(event);
    }

    async fn log(&self, line: String) {
        let Some(log_id) = self.inner.options.log_id.as_deref() else {
            return;
        };
        let line = format!(
            "[{}] {line}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        if let Err(err) = self.inner.ctx.logs().append(log_id, &line).await {
            warn!(log_id, error = %err, "failed to append sync log");
        }
    }

    fn next_target(&self) -> Option<String> {
        let mut state = self.state();
        let name = state.queue.pop_front()?;
        state.in_progress.insert(name.clone());
        Some(name)
    }

    fn finish_if_drained(&self) -> Option<SyncSummary> {
        let mut state = self.state();
        if !state.queue.is_empty() || !state.in_progress.is_empty() {
            return None;
        }
        state.ended = true;
        Some(state.summary.clone())
    }

    async fn run(self) {
        let run_id = self.inner.run_id;
        let targets = self.state().queue.len();
        let concurrency = self.inner.ctx.config().sync_concurrency().max(1);

        self.emit(SyncEvent::RunStarted {
            run_id,
            log_id: self.inner.options.log_id.clone(),
            targets,
        });
        info!(
            targets,
            concurrency,
            username = self.inner.options.username.as_deref(),
            "sync run started"
        );
        self.log(format!(
            "start sync of {targets} target(s) by {}",
            self.inner.options.username.as_deref().unwrap_or("anonymous")
        ))
        .await;

        let permits = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        let mut running: HashMap<Id, String> = HashMap::new();

        let summary = loop {
            while let Ok(permit) = permits.clone().try_acquire_owned() {
                let Some(name) = self.next_target() else {
                    break;
                };
                let worker = self.clone();
                let target = name.clone();
                let task = tasks.spawn(
                    async move {
                        let _permit = permit;
                        let outcome = worker.process(&target).await;
                        (target, outcome)
                    }
                    .in_current_span(),
                );
                running.insert(task.id(), name);
            }

            if tasks.is_empty() {
                if let Some(summary) = self.finish_if_drained() {
                    break summary;
                }
                continue;
            }

            tokio::select! {
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((id, (name, outcome)))) => {
                        running.remove(&id);
                        self.record(&name, outcome).await;
                    }
                    Some(Err(err)) => {
                        let name = running.remove(&err.id()).unwrap_or_default();
                        let error: OperationError = SyncError::Panicked(name.clone()).into();
                        self.record(&name, Err(error)).await;
                    }
                    None => {}
                },
                _ = self.inner.wake.notified() => {}
            }
        };

        self.emit(SyncEvent::RunComplete {
            run_id,
            successes: summary.successes.len(),
            failures: summary.failures.len(),
        });
        info!(
            successes = summary.successes.len(),
            failures = summary.failures.len(),
            "sync run complete"
        );
        self.log(format!(
            "end: {} success(es), {} failure(s)",
            summary.successes.len(),
            summary.failures.len()
        ))
        .await;

        self.inner.done.send_replace(Some(summary));
    }

    async fn record(&self, name: &str, outcome: Result<TargetOutcome>) {
        let run_id = self.inner.run_id;
        {
            let mut state = self.state();
            state.in_progress.remove(name);
            let summary = &mut state.summary;
            match &outcome {
                Ok(result) => {
                    summary.successes.push(name.to_string());
                    match result {
                        TargetOutcome::Synced {
                            changed,
                            reconciled,
                        } => {
                            summary.changed.insert(name.to_string(), changed.clone());
                            summary.reconciled.insert(name.to_string(), *reconciled);
                        }
                        TargetOutcome::Unpublished { removed } => {
                            summary.reconciled.insert(name.to_string(), *removed);
                        }
                        TargetOutcome::User(user) => {
                            let touched = usize::from(user.upserted || user.deleted);
                            summary.reconciled.insert(name.to_string(), touched);
                        }
                        TargetOutcome::Skipped(_) => {}
                    }
                }
                Err(err) => {
                    summary.failures.push(name.to_string());
                    summary.errors.insert(name.to_string(), err.to_string());
                }
            }
        }

        let (event, line) = match outcome {
            Ok(TargetOutcome::Synced {
                changed,
                reconciled,
            }) => {
                (
                    SyncEvent::TargetSynced {
                        run_id,
                        name: name.to_string(),
                        changed: changed.len(),
                    },
                    format!("[{name}] synced, {reconciled} version(s) reconciled"),
                )
            }
            Ok(TargetOutcome::Unpublished { removed }) => {
                (
                    SyncEvent::TargetSynced {
                        run_id,
                        name: name.to_string(),
                        changed: removed,
                    },
                    format!("[{name}] unpublished, {removed} version(s) removed"),
                )
            }
            Ok(TargetOutcome::User(user)) => {
                (
                    SyncEvent::TargetSynced {
                        run_id,
                        name: name.to_string(),
                        changed: usize::from(user.upserted || user.deleted),
                    },
                    format!(
                        "[user:{name}] upserted: {}, deleted: {}",
                        user.upserted, user.deleted
                    ),
                )
            }
            Ok(TargetOutcome::Skipped(reason)) => {
                let why = match reason {
                    SkipReason::Private => "private package",
                    SkipReason::NotFound => "not found",
                };
                (
                    SyncEvent::TargetSkipped {
                        run_id,
                        name: name.to_string(),
                        reason,
                    },
                    format!("[{name}] skipped: {why}"),
                )
            }
            Err(err) => {
                warn!(name, error = %err, "sync failed");
                (
                    SyncEvent::TargetFailed {
                        run_id,
                        name: name.to_string(),
                        error: err.to_string(),
                    },
                    format!("[{name}] failed: {err}"),
                )
            }
        };

        self.emit(event);
        self.log(line).await;
    }

    async fn process(&self, name: &str) -> Result<TargetOutcome> {
        self.emit(SyncEvent::TargetStarted {
            run_id: self.inner.run_id,
            name: name.to_string(),
        });

        match self.inner.options.kind {
            TargetKind::User => {
                reconcile_user(&self.inner.ctx, name)
                    .await
                    .map(TargetOutcome::User)
            }
            TargetKind::Package => self.sync_package(name).await,
        }
    }

    async fn fetch(&self, name: &str) -> Result<UpstreamPackage> {
        let ctx = &self.inner.ctx;
        if !self.inner.options.from_backup {
            if ctx.config().upstream_is_mirror() {
                self.sync_upstream(name).await;
            }
            return Ok(ctx.upstream().fetch_package(name).await?);
        }

        match restore(ctx.blobs().as_ref(), name).await {
            Ok(Restored::Document(doc)) => Ok(UpstreamPackage::Found(doc)),
            Ok(Restored::Unpublished(record)) => Ok(UpstreamPackage::Unpublished(record)),
            Err(BackupError::NotFound(_)) => Ok(UpstreamPackage::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn sync_package(&self, name: &str) -> Result<TargetOutcome> {
        let ctx = &self.inner.ctx;
        let config = ctx.config();
        let from_backup = self.inner.options.from_backup;

        if config.is_private_package(name) {
            debug!(name, "private package, not synced");
            return Ok(TargetOutcome::Skipped(SkipReason::Private));
        }

        let _guard = SYNC_LOCKS.lock(name).await;
        let store = ctx.packages().as_ref();

        let outcome = match self.fetch(name).await? {
            UpstreamPackage::NotFound => {
                info!(name, "not found upstream");
                return Ok(TargetOutcome::Skipped(SkipReason::NotFound));
            }
            UpstreamPackage::Unpublished(record) => {
                let removed = apply_unpublish(store, &record).await?;
                if config.backup_enabled() {
                    save_backup_files(store, ctx.blobs().as_ref(), name).await?;
                    save_unpublish_record(ctx.blobs().as_ref(), &record).await?;
                }
                TargetOutcome::Unpublished { removed }
            }
            UpstreamPackage::Found(doc) => {
                let local = load_local(store, name).await?;
                let options = ReconcileOptions {
                    registry_host: config.registry_host().to_string(),
                    abbreviated: config.abbreviated_enabled(),
                };
                let plan = reconcile(&local, &doc, &options);

                let mirror = (config.tarballs_enabled() && !from_backup).then(|| {
                    TarballMirror {
                        upstream: ctx.upstream().as_ref(),
                        blobs: ctx.blobs().as_ref(),
                    }
                });
                let report = apply(&plan, store, mirror).await?;

                if !report.changed.is_empty() && !self.inner.options.skip_dependencies {
                    if let Some(latest) = plan.latest_record(&doc) {
                        self.expand_dependencies(name, latest.dependency_names())
                            .await?;
                    }
                }

                TargetOutcome::Synced {
                    reconciled: report.changed.len()
                        + plan.abbreviated_repairs()
                        + report.removed.len(),
                    changed: report.changed,
                }
            }
        };

        let changed_versions = match &outcome {
            TargetOutcome::Synced { changed, .. } => changed.clone(),
            _ => Vec::new(),
        };
        let touched = match &outcome {
            TargetOutcome::Synced { reconciled, .. } => *reconciled > 0,
            _ => true,
        };

        if let Some(hook) = ctx.hook() {
            let envelope = HookEnvelope::package_sync(name, changed_versions);
            if let Err(err) = hook.call(envelope).await {
                warn!(name, error = %err, "global hook failed");
            }
        }
        if touched {
            self.refresh_upstream_cache(name).await;
        }

        if config.backup_enabled() && matches!(outcome, TargetOutcome::Synced { .. }) {
            let saved = save_backup_files(store, ctx.blobs().as_ref(), name).await?;
            debug!(
                name,
                written = saved.written,
                removed = saved.removed,
                "backup files saved"
            );
        }

        Ok(outcome)
    }

    async fn expand_dependencies(&self, parent: &str, names: Vec<String>) -> Result<()> {
        let ctx = &self.inner.ctx;
        let only_existing = ctx.config().sync_mode() == SyncMode::Exist;

        for name in names {
            if only_existing && !ctx.packages().exists(&name).await? {
                continue;
            }
            if self.enqueue(&name) {
                debug!(name, parent, "dependency queued");
                self.emit(SyncEvent::DependencyQueued {
                    run_id: self.inner.run_id,
                    name,
                    parent: parent.to_string(),
                });
            }
        }
        Ok(())
    }
}
