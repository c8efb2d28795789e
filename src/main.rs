use anyhow::Result;
use clap::Parser;

use scand::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}
