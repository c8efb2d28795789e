//! Scan executor contract and the executor registry
//!
//! Executors are the pluggable analysis routines the orchestrator drives. The
//! contract is deliberately narrow: one synchronous `run` call per scan,
//! invoked on a blocking worker, returning either the findings or the
//! cancellation outcome. Cancellation is cooperative: the orchestrator never
//! terminates an executor, it sets the token and the executor is required to
//! poll it at bounded intervals and exit promptly once set.
//!
//! Implementations register in an [`ExecutorSet`] under their `kind` tag;
//! records carry the tag so the right executor is selected at dispatch.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::Finding;

mod command;

pub use command::CommandExecutor;

/// Cooperative cancellation flag shared between the orchestrator and one
/// running executor.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Polled by executors at their checkpoints.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What one executor run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Normal completion with the findings produced (possibly none).
    Completed(Vec<Finding>),
    /// The executor observed the cancellation token and stopped early.
    Cancelled,
}

/// Capability interface implemented once per scanner kind.
pub trait ScanExecutor: Send + Sync {
    /// Selector tag stored on records submitted for this executor.
    fn kind(&self) -> &'static str;

    /// Run the analysis against `target`.
    ///
    /// May take seconds to hours. Must poll `cancel` at bounded intervals
    /// and return [`ScanOutcome::Cancelled`] promptly once it is set; an
    /// `Err` is recorded on the scan as its failure diagnostic.
    fn run(&self, target: &str, cancel: &CancelToken) -> Result<ScanOutcome>;
}

/// Registry of executors keyed by kind
pub struct ExecutorSet {
    executors: HashMap<String, Arc<dyn ScanExecutor>>,
}

impl ExecutorSet {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register<E: ScanExecutor + 'static>(&mut self, executor: E) {
        let kind = executor.kind().to_string();
        self.executors.insert(kind, Arc::new(executor));
    }

    pub fn register_shared(&mut self, executor: Arc<dyn ScanExecutor>) {
        let kind = executor.kind().to_string();
        self.executors.insert(kind, executor);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn ScanExecutor>> {
        self.executors.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.executors.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.executors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl Default for ExecutorSet {
    fn default() -> Self {
        Self::new()
    }
}
