use anyhow::Result;
use clap::Parser;
use solana_tx_normalizer::cli::{Cli, execute};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = execute(cli).await {
        tracing::error!("run failed: {err:#}");
        return Err(err);
    }
    Ok(())
}
