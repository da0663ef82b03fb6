use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};

use crate::error::Error;
use crate::logging::LogConfig;
use crate::pipeline::{Granularity, PipelineOptions};
use crate::sink::RecordFilter;

pub const ENV_PREFIX: &str = "SOLNORM";

/// Top-level settings, usually read from a TOML file and overridden from the
/// environment (`SOLNORM_PIPELINE__BLOCK_COUNT=5`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub solana: SolanaConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub commitment: Commitment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn to_commitment_config(self) -> CommitmentConfig {
        let commitment = match self {
            Self::Processed => CommitmentLevel::Processed,
            Self::Confirmed => CommitmentLevel::Confirmed,
            Self::Finalized => CommitmentLevel::Finalized,
        };
        CommitmentConfig { commitment }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How many slots to scan back from the current one.
    pub block_count: u64,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub filter: RecordFilter,
    /// Concurrent block fetches; `1` keeps requests strictly sequential.
    pub max_in_flight: usize,
    pub source_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
    pub file_prefix: String,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            commitment: Commitment::Confirmed,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_count: 10,
            granularity: Granularity::Transaction,
            filter: RecordFilter::All,
            max_in_flight: 1,
            source_tag: "solana-devnet".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
            file_prefix: "records".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.pipeline.max_in_flight == 0 {
            return Err(Error::Config {
                reason: "pipeline.max_in_flight must be at least 1".into(),
            });
        }
        if self.pipeline.filter == RecordFilter::KnownTransfers
            && self.pipeline.granularity == Granularity::Transaction
        {
            return Err(Error::Config {
                reason: "filter known-transfers needs granularity instruction".into(),
            });
        }
        if self.solana.rpc_url.trim().is_empty() {
            return Err(Error::Config {
                reason: "solana.rpc_url is empty".into(),
            });
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            granularity: self.pipeline.granularity,
            source_tag: self.pipeline.source_tag.clone(),
            max_in_flight: self.pipeline.max_in_flight,
        }
    }
}

/// Defaults, then the optional TOML file at `path`, then `SOLNORM_*`
/// environment variables. Not validated here: callers apply their own
/// overrides first and then call [`Config::validate`].
pub fn load_config(path: Option<&str>) -> Result<Config, Error> {
    let defaults = config::Config::try_from(&Config::default()).map_err(config_error)?;
    let mut builder = config::Config::builder().add_source(defaults);
    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .map_err(config_error)?
        .try_deserialize()
        .map_err(config_error)
}

fn config_error(err: config::ConfigError) -> Error {
    Error::Config {
        reason: err.to_string(),
    }
}
