//! Long-running service command

use anyhow::Result;
use tracing::info;

use crate::config::ServiceConfig;
use crate::server;

pub async fn execute(
    mut config: ServiceConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let store = super::open_store(&config)?;
    let orchestrator = super::build_orchestrator(&config, store)?;

    // Reconcile leftovers from an unclean shutdown before accepting traffic.
    orchestrator.recover()?;

    info!(
        db = %config.database.path.display(),
        kind = %config.scanner.kind,
        "orchestrator ready"
    );
    server::serve(orchestrator, &config.listen_addr()).await
}
