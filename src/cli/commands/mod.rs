//! Command implementations for the scand CLI
//!
//! Each command lives in its own module. The builders here wire the store,
//! executor set and orchestrator from configuration so every command
//! assembles the stack the same way.

use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::executor::{CommandExecutor, ExecutorSet};
use crate::orchestrator::Orchestrator;
use crate::registry::ScanRegistry;
use crate::store::ScanStore;

pub mod config;
pub mod list;
pub mod scan;
pub mod serve;
pub mod status;

/// Open the store configured under `[database]`.
pub(crate) fn open_store(config: &ServiceConfig) -> Result<Arc<ScanStore>> {
    let store = ScanStore::open(&config.database.path).with_context(|| {
        format!(
            "failed to open scan store at {}",
            config.database.path.display()
        )
    })?;
    Ok(Arc::new(store))
}

/// Wire the executor set and orchestrator from configuration.
pub(crate) fn build_orchestrator(
    config: &ServiceConfig,
    store: Arc<ScanStore>,
) -> Result<Orchestrator> {
    let mut executors = ExecutorSet::new();
    executors.register(
        CommandExecutor::new(&config.scanner.command, config.scanner.args.clone())
            .with_poll_interval(Duration::from_millis(config.scanner.poll_interval_ms)),
    );

    if !executors.contains(&config.scanner.kind) {
        bail!(
            "no executor registered for configured kind '{}' (available: {})",
            config.scanner.kind,
            executors.kinds().join(", ")
        );
    }

    Ok(Orchestrator::new(
        store,
        ScanRegistry::new(),
        executors,
        config.scanner.kind.clone(),
    ))
}
