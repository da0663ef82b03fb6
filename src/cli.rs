use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, load_config};
use crate::logging;
use crate::pipeline::{Granularity, Pipeline};
use crate::sink::{JsonFileSink, RecordFilter, emit};
use crate::source::RpcBlockSource;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan recent blocks and write the normalized records to a JSON file.
    Run(RunCmd),
}

/// Flags override values from the configuration file and environment.
#[derive(Parser, Debug, Default)]
pub struct RunCmd {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<String>,

    /// JSON-RPC endpoint.
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Number of slots to scan back from the current one.
    #[arg(short, long)]
    pub blocks: Option<u64>,

    /// `transaction` or `instruction`.
    #[arg(long)]
    pub granularity: Option<Granularity>,

    /// `all` or `known-transfers`.
    #[arg(long)]
    pub filter: Option<RecordFilter>,

    /// Concurrent block fetches.
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Directory for the output file.
    #[arg(short, long)]
    pub output_dir: Option<String>,
}

impl RunCmd {
    pub fn apply(&self, config: &mut Config) {
        if let Some(rpc_url) = &self.rpc_url {
            config.solana.rpc_url.clone_from(rpc_url);
        }
        if let Some(blocks) = self.blocks {
            config.pipeline.block_count = blocks;
        }
        if let Some(granularity) = self.granularity {
            config.pipeline.granularity = granularity;
        }
        if let Some(filter) = self.filter {
            config.pipeline.filter = filter;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.pipeline.max_in_flight = max_in_flight;
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir.clone_from(dir);
        }
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(cmd) => run(&cmd).await,
    }
}

/// Loads configuration, scans the block window and writes the output file.
/// Ctrl-C stops the scan between slots; whatever was gathered is still written.
pub async fn run(cmd: &RunCmd) -> Result<()> {
    let mut config = load_config(cmd.config.as_deref()).context("failed to load configuration")?;
    cmd.apply(&mut config);
    config.validate().context("invalid configuration")?;
    logging::init(&config.log).context("failed to initialise logging")?;

    tracing::info!(
        rpc_url = %config.solana.rpc_url,
        block_count = config.pipeline.block_count,
        filter = %config.pipeline.filter,
        "starting run"
    );

    let source = RpcBlockSource::from_url(
        &config.solana.rpc_url,
        config.solana.commitment.to_commitment_config(),
    );
    let pipeline = Pipeline::new(source, config.pipeline_options());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing current block");
            on_signal.cancel();
        }
    });

    let output = pipeline
        .run_until_cancelled(config.pipeline.block_count, &cancel)
        .await
        .context("block scan failed")?;

    let sink = JsonFileSink::timestamped(
        &config.output.dir,
        &config.output.file_prefix,
        Utc::now(),
    );
    let filter = config.pipeline.filter;
    let written = emit(output.records, |r| filter.matches(r), &sink)
        .with_context(|| format!("failed to write {}", sink.path().display()))?;

    tracing::info!(
        start_slot = output.report.start_slot,
        slots_requested = output.report.slots_requested,
        blocks_fetched = output.report.blocks_fetched,
        slots_skipped = output.report.slots_skipped,
        records = output.report.records,
        written,
        path = %sink.path().display(),
        "run complete"
    );
    Ok(())
}
