//! Scan orchestration: intake, dispatch, cancellation, reconciliation
//!
//! The orchestrator is the only writer of scan state. It drives records along
//! the lifecycle graph, writing every transition through the store, and keeps
//! the registry claim held from submission until the terminal write. Executor
//! invocations run on the blocking worker pool so a scan that takes hours
//! never stalls request handling; each running scan gets a cancellation token
//! the executor polls at its checkpoints.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Result, ScanError};
use crate::executor::{CancelToken, ExecutorSet, ScanOutcome};
use crate::model::{ScanRecord, ScanState};
use crate::registry::ScanRegistry;
use crate::store::ScanStore;

/// What startup reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Orphaned Running records transitioned to Failed
    pub failed: usize,
    /// Pending records whose registry claims were re-established
    pub restored: usize,
    /// Duplicate Pending records cancelled (one target, two active rows)
    pub cancelled: usize,
}

/// Cloneable handle driving scans through their lifecycle.
///
/// Clones share one store, one registry and one executor set. The registry is
/// handed in at construction; whoever builds the orchestrator decides its
/// scope.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    store: Arc<ScanStore>,
    registry: ScanRegistry,
    executors: ExecutorSet,
    default_kind: String,
    tokens: Mutex<HashMap<Uuid, CancelToken>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ScanStore>,
        registry: ScanRegistry,
        executors: ExecutorSet,
        default_kind: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                store,
                registry,
                executors,
                default_kind: default_kind.into(),
                tokens: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &ScanStore {
        &self.inner.store
    }

    pub fn registry(&self) -> &ScanRegistry {
        &self.inner.registry
    }

    pub fn default_kind(&self) -> &str {
        &self.inner.default_kind
    }

    /// Registered executor kinds, for surfaces that enumerate them.
    pub fn kinds(&self) -> Vec<String> {
        self.inner.executors.kinds()
    }

    /// Create a Pending record for `target` under the default executor kind
    /// and return its id. Execution happens separately via [`dispatch`].
    ///
    /// [`dispatch`]: Orchestrator::dispatch
    pub fn submit(&self, target: &str) -> Result<Uuid> {
        let kind = self.inner.default_kind.clone();
        self.submit_with_kind(target, &kind)
    }

    /// Like [`submit`](Orchestrator::submit) with an explicit executor kind.
    pub fn submit_with_kind(&self, target: &str, kind: &str) -> Result<Uuid> {
        if !self.inner.executors.contains(kind) {
            return Err(ScanError::UnknownKind(kind.to_string()));
        }

        // Claim the target first so a busy target never leaves a stray row.
        let id = self.inner.registry.acquire(target)?;
        let record = ScanRecord::new(id, target, kind);
        if let Err(e) = self.inner.store.create(&record) {
            self.inner.registry.release(target, id);
            return Err(e);
        }

        info!(scan = %id, target = %target, kind = %kind, "scan submitted");
        Ok(id)
    }

    /// Submit and spawn the dispatch on the async runtime. This is the
    /// composite the transport layer calls; the returned id is immediately
    /// pollable via [`status`](Orchestrator::status).
    pub fn start(&self, target: &str) -> Result<Uuid> {
        let kind = self.inner.default_kind.clone();
        self.start_with_kind(target, &kind)
    }

    pub fn start_with_kind(&self, target: &str, kind: &str) -> Result<Uuid> {
        let id = self.submit_with_kind(target, kind)?;
        let orchestrator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.dispatch(id).await {
                error!(scan = %id, error = %e, "dispatch failed");
            }
        });
        Ok(id)
    }

    /// Run the scan to a terminal state and return the final record.
    ///
    /// Transitions Pending -> Running, invokes the executor for the record's
    /// kind on a blocking worker, then persists the terminal transition
    /// atomically with any findings. The registry claim is released in every
    /// terminal case. A scan cancelled before dispatch comes back unchanged.
    pub async fn dispatch(&self, id: Uuid) -> Result<ScanRecord> {
        let mut record = self.inner.store.get(id)?;
        if record.is_terminal() {
            debug!(scan = %id, state = %record.state, "dispatch skipped, scan already terminal");
            return Ok(record);
        }

        record.mark_running()?;
        if let Err(e) = self.inner.store.update(&record) {
            // A concurrent cancellation may have won the serialized write.
            let current = self.inner.store.get(id)?;
            if current.is_terminal() {
                debug!(scan = %id, state = %current.state, "lost dispatch race to cancellation");
                return Ok(current);
            }
            return Err(e);
        }
        info!(scan = %id, target = %record.target, "scan running");

        let token = self.token_for(id);
        let Some(executor) = self.inner.executors.get(&record.kind) else {
            // The kind was validated at submission; an executor set rebuilt
            // without it is the only way here.
            let diagnostic = ScanError::UnknownKind(record.kind.clone()).to_string();
            error!(scan = %id, kind = %record.kind, "no executor registered for persisted kind");
            record.fail(diagnostic)?;
            return self.finish(record);
        };

        let target = record.target.clone();
        let worker_token = token.clone();
        let joined =
            tokio::task::spawn_blocking(move || executor.run(&target, &worker_token)).await;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(anyhow::anyhow!("executor panicked")),
            Err(_) => Err(anyhow::anyhow!("executor task aborted")),
        };

        match outcome {
            Ok(ScanOutcome::Completed(findings)) => {
                info!(scan = %id, findings = findings.len(), "scan completed");
                record.complete(findings)?;
            }
            Ok(ScanOutcome::Cancelled) => {
                info!(scan = %id, "executor honored cancellation");
                record.cancel()?;
            }
            Err(e) => {
                warn!(scan = %id, error = %e, "scan failed");
                record.fail(ScanError::Executor(e.to_string()).to_string())?;
            }
        }
        self.finish(record)
    }

    /// Request cooperative cancellation.
    ///
    /// Pending scans transition directly to Cancelled. Running scans have
    /// their token set and keep running until the executor's next checkpoint.
    /// Cancelling an already-terminal scan is a no-op reporting its state.
    pub fn cancel(&self, id: Uuid) -> Result<ScanState> {
        let mut record = self.inner.store.get(id)?;
        match record.state {
            ScanState::Pending => {
                record.cancel()?;
                match self.inner.store.update(&record) {
                    Ok(()) => {
                        // A dispatch that lost the serialized write may
                        // already be driving an executor; set the token so
                        // it stops at its next checkpoint.
                        self.token_for(id).cancel();
                        self.inner.registry.release(&record.target, id);
                        self.drop_token(id);
                        info!(scan = %id, target = %record.target, "scan cancelled before dispatch");
                        Ok(ScanState::Cancelled)
                    }
                    // The scan moved on between the read and the write;
                    // report where it landed.
                    Err(ScanError::InvalidTransition { .. }) => self.request_stop(id),
                    Err(e) => Err(e),
                }
            }
            ScanState::Running => self.request_stop(id),
            terminal => {
                debug!(scan = %id, state = %terminal, "cancel on terminal scan is a no-op");
                Ok(terminal)
            }
        }
    }

    /// Read-through to the store.
    pub fn status(&self, id: Uuid) -> Result<ScanRecord> {
        self.inner.store.get(id)
    }

    /// Startup reconciliation over everything the store still considers
    /// active.
    ///
    /// Running records cannot have a live executor in a fresh process, so
    /// each is failed with a reconciliation diagnostic and its claim
    /// released. Pending records were never dispatched; their claims are
    /// re-established so per-target uniqueness spans the restart.
    pub fn recover(&self) -> Result<RecoverySummary> {
        let active = self.inner.store.list_active()?;
        let mut summary = RecoverySummary::default();

        // Orphans first: a release here must not evict a claim restored for
        // some Pending record on the same target.
        for record in &active {
            if record.state == ScanState::Running {
                let mut orphan = record.clone();
                orphan.fail(
                    ScanError::Reconciliation(
                        "scan was running when the service stopped".to_string(),
                    )
                    .to_string(),
                )?;
                self.inner.store.update(&orphan)?;
                self.inner.registry.release(&orphan.target, orphan.id);
                warn!(
                    scan = %orphan.id,
                    target = %orphan.target,
                    "orphaned running scan marked failed during reconciliation"
                );
                summary.failed += 1;
            }
        }

        for record in &active {
            if record.state == ScanState::Pending {
                if self.inner.registry.restore(&record.target, record.id) {
                    debug!(scan = %record.id, target = %record.target, "pending scan re-registered");
                    summary.restored += 1;
                } else {
                    // Two active records for one target should be impossible;
                    // resolve deterministically by cancelling the newer one.
                    let mut extra = record.clone();
                    extra.cancel()?;
                    self.inner.store.update(&extra)?;
                    warn!(
                        scan = %extra.id,
                        target = %extra.target,
                        "duplicate pending scan cancelled during reconciliation"
                    );
                    summary.cancelled += 1;
                }
            }
        }

        if summary != RecoverySummary::default() {
            info!(
                failed = summary.failed,
                restored = summary.restored,
                cancelled = summary.cancelled,
                "startup reconciliation finished"
            );
        }
        Ok(summary)
    }

    fn request_stop(&self, id: Uuid) -> Result<ScanState> {
        // Set the token before re-reading: an entry still present after the
        // state check belongs to a dispatch that has not finished, and its
        // finish() will drop it.
        self.token_for(id).cancel();
        let current = self.inner.store.get(id)?;
        if current.is_terminal() {
            // finish() already ran; take back the entry the line above may
            // have re-created.
            self.drop_token(id);
            debug!(scan = %id, state = %current.state, "cancel after terminal write is a no-op");
        } else {
            info!(scan = %id, "cancellation requested");
        }
        Ok(current.state)
    }

    fn finish(&self, record: ScanRecord) -> Result<ScanRecord> {
        let persisted = self.inner.store.update(&record);
        // Release even when the terminal write failed: a target must never
        // stay claimed by a scan nothing is driving anymore.
        self.inner.registry.release(&record.target, record.id);
        self.drop_token(record.id);
        persisted?;
        Ok(record)
    }

    fn token_for(&self, id: Uuid) -> CancelToken {
        let mut tokens = self.inner.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.entry(id).or_default().clone()
    }

    fn drop_token(&self, id: Uuid) {
        let mut tokens = self.inner.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScanExecutor;
    use anyhow::Result as AnyResult;

    struct NullExecutor;

    impl ScanExecutor for NullExecutor {
        fn kind(&self) -> &'static str {
            "null"
        }

        fn run(&self, _target: &str, _cancel: &CancelToken) -> AnyResult<ScanOutcome> {
            Ok(ScanOutcome::Completed(Vec::new()))
        }
    }

    fn orchestrator() -> Orchestrator {
        let mut executors = ExecutorSet::new();
        executors.register(NullExecutor);
        Orchestrator::new(
            Arc::new(ScanStore::in_memory().unwrap()),
            ScanRegistry::new(),
            executors,
            "null",
        )
    }

    #[test]
    fn submit_creates_a_pending_record() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("host-1").unwrap();

        let record = orchestrator.status(id).unwrap();
        assert_eq!(record.state, ScanState::Pending);
        assert_eq!(record.target, "host-1");
        assert_eq!(record.kind, "null");
        assert_eq!(orchestrator.registry().active_scan("host-1"), Some(id));
    }

    #[test]
    fn busy_target_rejects_a_second_submit() {
        let orchestrator = orchestrator();
        orchestrator.submit("host-1").unwrap();

        let err = orchestrator.submit("host-1").unwrap_err();
        assert!(matches!(err, ScanError::AlreadyRunning(t) if t == "host-1"));
        assert_eq!(orchestrator.store().list_active().unwrap().len(), 1);
    }

    #[test]
    fn unknown_kind_is_rejected_without_claiming() {
        let orchestrator = orchestrator();
        let err = orchestrator
            .submit_with_kind("host-1", "quantum")
            .unwrap_err();
        assert!(matches!(err, ScanError::UnknownKind(k) if k == "quantum"));
        assert!(orchestrator.registry().is_empty());
    }

    #[test]
    fn cancel_pending_releases_the_target() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("host-2").unwrap();

        let state = orchestrator.cancel(id).unwrap();
        assert_eq!(state, ScanState::Cancelled);
        let record = orchestrator.status(id).unwrap();
        assert_eq!(record.state, ScanState::Cancelled);
        assert!(record.started_at.is_none());
        assert!(record.finished_at.is_some());

        // The target is free again.
        orchestrator.submit("host-2").unwrap();
    }

    #[test]
    fn cancel_is_idempotent_on_terminal_scans() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("host-2").unwrap();
        assert_eq!(orchestrator.cancel(id).unwrap(), ScanState::Cancelled);
        assert_eq!(orchestrator.cancel(id).unwrap(), ScanState::Cancelled);
    }

    #[tokio::test]
    async fn stop_request_after_completion_leaves_no_token_behind() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("host-1").unwrap();
        orchestrator.dispatch(id).await.unwrap();

        // A cancel racing in after the terminal write lands here; it must
        // report the terminal state without re-creating the dropped token.
        assert_eq!(orchestrator.request_stop(id).unwrap(), ScanState::Completed);
        assert!(orchestrator.inner.tokens.lock().unwrap().is_empty());
    }

    #[test]
    fn status_of_unknown_scan_is_not_found() {
        let orchestrator = orchestrator();
        let id = Uuid::new_v4();
        assert!(matches!(
            orchestrator.status(id),
            Err(ScanError::NotFound(i)) if i == id
        ));
    }

    #[test]
    fn cancel_of_unknown_scan_is_not_found() {
        let orchestrator = orchestrator();
        assert!(matches!(
            orchestrator.cancel(Uuid::new_v4()),
            Err(ScanError::NotFound(_))
        ));
    }
}
