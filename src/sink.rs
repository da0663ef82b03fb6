use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::record::Record;

/// Named inclusion predicates selectable from configuration.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecordFilter {
    #[default]
    All,
    /// Only `NativeSOLTransfer` and `SPLTokenTransfer` instruction records.
    KnownTransfers,
}

impl RecordFilter {
    pub fn matches(self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::KnownTransfers => record
                .event_type()
                .is_some_and(|event_type| event_type.is_known_transfer()),
        }
    }
}

/// Single order-preserving pass, no deduplication.
pub fn filter_records<F>(records: Vec<Record>, predicate: F) -> Vec<Record>
where
    F: Fn(&Record) -> bool,
{
    records.into_iter().filter(|r| predicate(r)).collect()
}

pub trait RecordSink {
    /// Writes the whole sequence or fails; never leaves a partial result.
    fn write(&self, records: &[Record]) -> Result<(), Error>;
}

/// Filters `records` and hands the survivors to `sink`. Returns how many
/// records were written.
pub fn emit<F>(records: Vec<Record>, predicate: F, sink: &dyn RecordSink) -> Result<usize, Error>
where
    F: Fn(&Record) -> bool,
{
    let total = records.len();
    let kept = filter_records(records, predicate);
    tracing::info!(total, kept = kept.len(), "emitting records");
    sink.write(&kept)?;
    Ok(kept.len())
}

/// Pretty-printed JSON array written to a temporary file in the target
/// directory and renamed into place. An existing file at the destination is
/// never replaced; the write fails instead.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<prefix>_<YYYYmmddTHHMMSSZ>.json`
    pub fn timestamped(dir: impl AsRef<Path>, prefix: &str, at: DateTime<Utc>) -> Self {
        let file_name = format!("{prefix}_{}.json", at.format("%Y%m%dT%H%M%SZ"));
        Self::new(dir.as_ref().join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonFileSink {
    fn write(&self, records: &[Record]) -> Result<(), Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, records)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist_noclobber(&self.path).map_err(|e| Error::Sink {
            reason: format!("failed to persist {}: {}", self.path.display(), e.error),
        })?;

        tracing::info!(path = %self.path.display(), records = records.len(), "wrote output file");
        Ok(())
    }
}
