use anyhow::Result;
use broomwagon::cli::{run, Cli};
use broomwagon::load_config::load_config;
use broomwagon::logging;
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = tracing::subscriber::with_default(logging::bootstrap(), || {
        load_config(cli.config.as_deref())
    })?;

    let log_file = logging::init(&settings.log_dir)?;
    tracing::info!(log_file = %log_file.display(), "CLI application startup: tracing initialised, environment loaded");
    settings.trace_loaded();

    let result = run(cli, settings).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
