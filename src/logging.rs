use std::fs::File;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    Registry,
    filter::LevelFilter,
    fmt::{self, writer::MakeWriterExt},
    prelude::*,
};

use crate::error::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Plain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`; unknown values mean `info`.
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub output: LogOutput,
    /// Required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
            output: LogOutput::Stdout,
            file_path: None,
        }
    }
}

impl LogConfig {
    pub fn level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }
}

/// Installs the global subscriber. Call once, before the pipeline runs.
pub fn init(config: &LogConfig) -> Result<(), Error> {
    let log_level = config.level();
    let subscriber = Registry::default().with(LevelFilter::from_level(log_level));

    let installed = match config.output {
        LogOutput::File => {
            let file_path = config.file_path.as_deref().ok_or_else(|| Error::Config {
                reason: "log output is 'file' but 'file_path' is not set".into(),
            })?;
            let writer = Mutex::new(File::create(file_path)?).with_max_level(log_level);
            match config.format {
                LogFormat::Json => subscriber
                    .with(fmt::layer().with_writer(writer).json())
                    .try_init(),
                LogFormat::Plain => subscriber
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .try_init(),
            }
        }
        LogOutput::Stdout => {
            let writer = std::io::stdout.with_max_level(log_level);
            match config.format {
                LogFormat::Json => subscriber
                    .with(fmt::layer().with_writer(writer).json())
                    .try_init(),
                LogFormat::Plain => subscriber
                    .with(fmt::layer().with_writer(writer).pretty())
                    .try_init(),
            }
        }
    };
    installed.map_err(|e| Error::Config {
        reason: format!("failed to install log subscriber: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_falls_back_to_info() {
        let config = LogConfig {
            level: "chatty".to_string(),
            ..LogConfig::default()
        };
        assert_eq!(config.level(), Level::INFO);
        let debug = LogConfig {
            level: "debug".to_string(),
            ..LogConfig::default()
        };
        assert_eq!(debug.level(), Level::DEBUG);
    }

    #[test]
    fn file_output_without_path_is_rejected() {
        let config = LogConfig {
            output: LogOutput::File,
            ..LogConfig::default()
        };
        assert!(matches!(init(&config), Err(Error::Config { .. })));
    }
}
