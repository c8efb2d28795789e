//! Show a stored scan record

use anyhow::Result;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::cli::output;
use crate::config::ServiceConfig;

pub async fn execute(config: &ServiceConfig, id: Uuid, format: OutputFormat) -> Result<()> {
    let store = super::open_store(config)?;
    let record = store.get(id)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => output::print_record(&record),
    }
    Ok(())
}
