//! receptor-node — the receptor sync engine's process binary.
//!
//! Startup sequence:
//!   1. Parse CLI overrides for the `sync.*` configuration keys (spec.md §6)
//!   2. Assemble the pipeline: every component in spec.md §2 wired against
//!      the in-memory collaborator adapters in `receptor-testkit`
//!   3. Run the autonomous loops — sync cron, resource adaptation, queue
//!      worker, abandonment sweep — until a shutdown signal arrives

use clap::Parser;
use tracing::info;

use receptor_node::config::ReceptorConfig;
use receptor_node::pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "receptor-node",
    version,
    about = "Receptor-side data synchronization engine for Open Finance Brasil"
)]
struct Args {
    /// `sync.cron` (spec.md §6), expressed as a fixed interval in seconds.
    #[arg(long)]
    sync_interval_secs: Option<u64>,

    /// How often the Job Queue worker polls for PENDING work.
    #[arg(long)]
    queue_poll_interval_secs: Option<u64>,

    /// Batch size the Job Queue worker reserves per poll.
    #[arg(long)]
    queue_batch_size: Option<usize>,

    /// How often the abandonment sweep runs over the Job Queue.
    #[arg(long)]
    abandonment_sweep_secs: Option<u64>,
}

impl Args {
    fn into_config(self) -> ReceptorConfig {
        let defaults = ReceptorConfig::default();
        ReceptorConfig {
            sync_interval_secs: self.sync_interval_secs.unwrap_or(defaults.sync_interval_secs),
            queue_poll_interval_secs: self
                .queue_poll_interval_secs
                .unwrap_or(defaults.queue_poll_interval_secs),
            queue_batch_size: self.queue_batch_size.unwrap_or(defaults.queue_batch_size),
            abandonment_sweep_secs: self
                .abandonment_sweep_secs
                .unwrap_or(defaults.abandonment_sweep_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,receptor=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = args.into_config();
    info!(
        sync_interval_secs = config.sync_interval_secs,
        queue_poll_interval_secs = config.queue_poll_interval_secs,
        "receptor node starting"
    );

    let pipeline = Pipeline::bootstrap(config);
    info!("pipeline assembled, entering the autonomous loops");
    pipeline.run_forever().await;

    Ok(())
}
