//! Walks a descending window of slots and turns each block into records.
//!
//! Slots are fetched one at a time by default. With `max_in_flight > 1` up to
//! that many `getBlock` calls run concurrently and the per-slot results are
//! re-sorted before flattening, so the output order is the same either way:
//! slot descending, then transaction index, then instruction index.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::normalize::{BlockContext, normalize, parse_instructions};
use crate::record::Record;
use crate::source::BlockSource;
use crate::types::{RawBlock, RawTransaction};

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
pub enum Granularity {
    /// One [`crate::record::CanonicalTransactionRecord`] per transaction.
    #[default]
    Transaction,
    /// One [`crate::record::ParsedInstructionRecord`] per top-level instruction.
    Instruction,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub granularity: Granularity,
    /// Written to each transaction record's `source` column.
    pub source_tag: String,
    /// Concurrent block fetches; `1` is strictly sequential.
    pub max_in_flight: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::Transaction,
            source_tag: "solana".to_string(),
            max_in_flight: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub start_slot: u64,
    pub slots_requested: usize,
    pub blocks_fetched: usize,
    pub slots_skipped: usize,
    pub records: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<Record>,
    pub report: PipelineReport,
}

enum SlotOutcome {
    Fetched(Vec<Record>),
    Unavailable,
}

pub struct Pipeline<S> {
    source: S,
    options: PipelineOptions,
}

impl<S: BlockSource> Pipeline<S> {
    pub fn new(source: S, options: PipelineOptions) -> Self {
        Self { source, options }
    }

    pub async fn run(&self, block_count: u64) -> Result<PipelineOutput, Error> {
        self.run_until_cancelled(block_count, &CancellationToken::new())
            .await
    }

    /// Like [`Pipeline::run`], but stops before the next slot once `cancel`
    /// fires. Blocks already fetched are kept whole.
    pub async fn run_until_cancelled(
        &self,
        block_count: u64,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, Error> {
        let start_slot = self.source.current_slot().await?;
        let slots = target_slots(start_slot, block_count);
        let processed_at = Utc::now();

        tracing::info!(
            start_slot,
            block_count,
            granularity = %self.options.granularity,
            max_in_flight = self.options.max_in_flight,
            "scanning blocks"
        );

        let outcomes = if self.options.max_in_flight <= 1 {
            self.fetch_sequential(&slots, processed_at, cancel).await
        } else {
            self.fetch_concurrent(&slots, processed_at, cancel).await
        };

        let mut report = PipelineReport {
            start_slot,
            slots_requested: slots.len(),
            cancelled: outcomes.len() < slots.len(),
            ..PipelineReport::default()
        };
        let mut records = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                SlotOutcome::Fetched(block_records) => {
                    report.blocks_fetched += 1;
                    records.extend(block_records);
                }
                SlotOutcome::Unavailable => report.slots_skipped += 1,
            }
        }
        report.records = records.len();

        if report.cancelled {
            tracing::warn!(
                attempted = report.blocks_fetched + report.slots_skipped,
                requested = report.slots_requested,
                "run cancelled before all slots were attempted"
            );
        }
        tracing::info!(
            blocks_fetched = report.blocks_fetched,
            slots_skipped = report.slots_skipped,
            records = report.records,
            "scan finished"
        );

        Ok(PipelineOutput { records, report })
    }

    async fn fetch_sequential(
        &self,
        slots: &[u64],
        processed_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<(u64, SlotOutcome)> {
        let mut outcomes = Vec::with_capacity(slots.len());
        for &slot in slots {
            if cancel.is_cancelled() {
                break;
            }
            outcomes.push((slot, self.process_slot(slot, processed_at).await));
        }
        outcomes
    }

    async fn fetch_concurrent(
        &self,
        slots: &[u64],
        processed_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<(u64, SlotOutcome)> {
        let mut outcomes: Vec<(u64, SlotOutcome)> = futures::stream::iter(slots.iter().copied())
            .map(|slot| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                Some((slot, self.process_slot(slot, processed_at).await))
            })
            .buffer_unordered(self.options.max_in_flight)
            .filter_map(futures::future::ready)
            .collect()
            .await;
        outcomes.sort_by(|a, b| b.0.cmp(&a.0));
        outcomes
    }

    async fn process_slot(&self, slot: u64, processed_at: DateTime<Utc>) -> SlotOutcome {
        match self.source.block(slot).await {
            Ok(Some(block)) => {
                let ctx = BlockContext::new(slot, &block, &self.options.source_tag, processed_at);
                let records = records_from_block(&block, &ctx, self.options.granularity);
                tracing::debug!(
                    slot,
                    transactions = block.transactions.len(),
                    records = records.len(),
                    "processed block"
                );
                SlotOutcome::Fetched(records)
            }
            Ok(None) => {
                tracing::warn!(slot, "block unavailable, skipping slot");
                SlotOutcome::Unavailable
            }
            Err(err) => {
                tracing::warn!(slot, %err, "failed to fetch block, skipping slot");
                SlotOutcome::Unavailable
            }
        }
    }
}

/// `count` contiguous slots from `start` downwards, stopping at slot 0.
pub fn target_slots(start: u64, count: u64) -> Vec<u64> {
    (0..count).map_while(|i| start.checked_sub(i)).collect()
}

/// Normalizes every transaction of one block in source order. Transactions
/// that fail to decode are logged and skipped; the rest of the block is kept.
pub fn records_from_block(
    block: &RawBlock,
    ctx: &BlockContext,
    granularity: Granularity,
) -> Vec<Record> {
    let mut records = Vec::with_capacity(block.transactions.len());
    for (index, value) in block.transactions.iter().enumerate() {
        let raw_tx = match RawTransaction::from_value(value) {
            Ok(raw_tx) => raw_tx,
            Err(err) => {
                tracing::warn!(slot = ctx.slot, index, %err, "skipping transaction");
                continue;
            }
        };

        match granularity {
            Granularity::Transaction => match normalize(&raw_tx, ctx, index as u64) {
                Ok(Some(record)) => records.push(Record::Transaction(record)),
                Ok(None) => {
                    tracing::debug!(slot = ctx.slot, index, "transaction has no accounts");
                }
                Err(err) => {
                    tracing::warn!(slot = ctx.slot, index, %err, "skipping transaction");
                }
            },
            Granularity::Instruction => match parse_instructions(&raw_tx, ctx) {
                Ok(parsed) => records.extend(parsed.into_iter().map(Record::Instruction)),
                Err(err) => {
                    tracing::warn!(slot = ctx.slot, index, %err, "skipping transaction");
                }
            },
        }
    }
    records
}
