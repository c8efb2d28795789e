//! One-shot scan command
//!
//! Submits and dispatches in the foreground rather than going through a
//! running service. Shares the database with a service instance, so the
//! per-target exclusivity the store enforces applies here too.

use anyhow::{Result, bail};

use crate::cli::OutputFormat;
use crate::cli::output;
use crate::config::ServiceConfig;
use crate::model::ScanState;

pub async fn execute(
    config: ServiceConfig,
    target: &str,
    kind: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let store = super::open_store(&config)?;
    let orchestrator = super::build_orchestrator(&config, store)?;

    let id = match kind {
        Some(kind) => orchestrator.submit_with_kind(target, kind)?,
        None => orchestrator.submit(target)?,
    };
    let record = orchestrator.dispatch(id).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => output::print_record(&record),
    }

    if record.state == ScanState::Failed {
        bail!(
            "scan {id} failed: {}",
            record.error.as_deref().unwrap_or("no diagnostic recorded")
        );
    }
    Ok(())
}
