use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::classifier::{Classification, classify};
use crate::error::Error;
use crate::record::{CanonicalTransactionRecord, ParsedInstructionRecord};
use crate::programs::EventType;
use crate::types::{RawBlock, RawInstruction, RawTransaction};

/// Block-level columns shared by every record produced from one block.
#[derive(Debug, Clone)]
pub struct BlockContext {
    pub slot: u64,
    pub block_hash: String,
    pub block_timestamp: i64,
    pub source: String,
    pub processed_at: DateTime<Utc>,
}

impl BlockContext {
    pub fn new(slot: u64, block: &RawBlock, source: &str, processed_at: DateTime<Utc>) -> Self {
        Self {
            slot,
            block_hash: block.blockhash.clone(),
            block_timestamp: block.block_time.unwrap_or(0),
            source: source.to_string(),
            processed_at,
        }
    }
}

/// Net lamports credited between two balance snapshots, never negative.
pub fn balance_delta(pre: u64, post: u64) -> u64 {
    post.saturating_sub(pre)
}

/// Builds the canonical row for one transaction.
///
/// `Ok(None)` means the transaction references no accounts and is dropped
/// silently; `Err` means its structure is unusable and the caller should skip
/// it.
pub fn normalize(
    raw_tx: &RawTransaction,
    ctx: &BlockContext,
    index: u64,
) -> Result<Option<CanonicalTransactionRecord>, Error> {
    let message = &raw_tx.transaction.message;
    let accounts = message.account_pubkeys();
    let Some(from_address) = accounts.first() else {
        return Ok(None);
    };
    let to_address = accounts.get(1).copied().unwrap_or_default();

    let hash = raw_tx.signature().ok_or_else(|| Error::Parse {
        reason: format!("transaction {index} in slot {} has no signature", ctx.slot),
    })?;

    let meta = raw_tx.meta.clone().unwrap_or_default();
    let pre = meta.pre_balances.get(1).copied().unwrap_or(0);
    let post = meta.post_balances.get(1).copied().unwrap_or(0);

    Ok(Some(CanonicalTransactionRecord {
        hash: hash.to_string(),
        block_number: ctx.slot,
        block_hash: ctx.block_hash.clone(),
        block_timestamp: ctx.block_timestamp,
        transaction_index: index,
        from_address: (*from_address).to_string(),
        to_address: to_address.to_string(),
        value: balance_delta(pre, post),
        fee: meta.fee.unwrap_or(0),
        status: u8::from(meta.err.is_none()),
        instructions_payload: serde_json::to_string(&message.instructions)?,
        nonce: None,
        contract_address: None,
        gas_price: None,
        max_fee_per_gas: None,
        max_priority_fee_per_gas: None,
        transaction_type: 0,
        source: ctx.source.clone(),
        created_at: ctx.processed_at,
    }))
}

/// Classifies every top-level instruction of a transaction, in order.
///
/// An instruction in a shape no decoder knows becomes `InvalidData` when its
/// program can still be read, and is skipped otherwise. An instruction whose
/// program cannot be resolved is skipped on its own. A transaction without a
/// signature is rejected as a whole.
pub fn parse_instructions(
    raw_tx: &RawTransaction,
    ctx: &BlockContext,
) -> Result<Vec<ParsedInstructionRecord>, Error> {
    let tx_id = raw_tx.signature().ok_or_else(|| Error::Parse {
        reason: format!("transaction in slot {} has no signature", ctx.slot),
    })?;
    let message = &raw_tx.transaction.message;
    let signer: BTreeSet<String> = message.signers().into_iter().map(String::from).collect();

    let mut records = Vec::with_capacity(message.instructions.len());
    for (index, value) in message.instructions.iter().enumerate() {
        let (program_id, classification) = match RawInstruction::from_value(value) {
            Ok(ix) => {
                let Some(program_id) = ix.program_id(&message.account_keys) else {
                    tracing::warn!(
                        slot = ctx.slot,
                        tx_id,
                        index,
                        "instruction program index out of range, skipping instruction"
                    );
                    continue;
                };
                (program_id.to_string(), classify(program_id, &ix))
            }
            Err(err) => {
                let Some(program_id) = message.raw_program_id(value) else {
                    tracing::warn!(
                        slot = ctx.slot,
                        tx_id,
                        index,
                        %err,
                        "instruction has no resolvable program, skipping instruction"
                    );
                    continue;
                };
                tracing::warn!(
                    slot = ctx.slot,
                    tx_id,
                    index,
                    program_id,
                    %err,
                    "unrecognised instruction shape"
                );
                let invalid = Classification {
                    event_type: EventType::InvalidData,
                    detail: None,
                };
                (program_id.to_string(), invalid)
            }
        };
        records.push(ParsedInstructionRecord {
            block_id: ctx.slot,
            tx_id: tx_id.to_string(),
            instruction_index: index as u64,
            signer: signer.clone(),
            program_id,
            event_type: classification.event_type,
            decoded_instruction: classification.detail,
        });
    }
    Ok(records)
}
