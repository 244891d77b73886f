mod replay;
mod scenario;

use std::path::PathBuf;

use clap::Parser;
use sync::config::SyncConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Replays a recorded timeline session against in-memory layers and prints
/// what the timeline ends up showing.
#[derive(Debug, Parser)]
struct Args {
    /// Scenario JSON file.
    scenario: PathBuf,
    /// Engine configuration JSON; TIMESYNC_* variables override it.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SyncConfig::from_json(&tokio::fs::read_to_string(path).await?)?,
        None => SyncConfig::default(),
    }
    .with_env_overrides()?;
    info!(max_features = config.max_features, "replaying {}", args.scenario.display());

    let scenario = serde_json::from_str(&tokio::fs::read_to_string(&args.scenario).await?)?;
    let report = replay::replay(config, scenario).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
