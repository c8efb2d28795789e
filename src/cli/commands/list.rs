//! List recent scans

use anyhow::Result;

use crate::cli::OutputFormat;
use crate::cli::output;
use crate::config::ServiceConfig;

pub async fn execute(config: &ServiceConfig, limit: usize, format: OutputFormat) -> Result<()> {
    let store = super::open_store(config)?;
    let records = store.list_recent(limit)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("no scans recorded");
            }
            for record in &records {
                output::print_record_line(record);
            }
        }
    }
    Ok(())
}
