// crates/server/src/main.rs
//! ses-local daemon binary: loads configuration, initializes logging, and
//! runs the orchestrator until shutdown.

use anyhow::Result;

use ses_core::Config;
use ses_server::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    let _logging_guard = ses_observability::init(&config.log_dir);

    tracing::info!("ses-local starting");

    Orchestrator::new(config).run().await?;

    tracing::info!("ses-local stopped");
    Ok(())
}
