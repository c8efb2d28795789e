//! Show the merged configuration
//!
//! Renders what the running process actually sees after defaults, the
//! config file and SCAND_* environment overrides have been layered.

use anyhow::{Context, Result};

use crate::config::ServiceConfig;

pub async fn execute(config: &ServiceConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
