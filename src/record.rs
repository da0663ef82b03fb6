use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::programs::{DecodedInstruction, EventType};

/// Network-agnostic row for one transaction.
///
/// Columns that only make sense on account-nonce/gas chains are kept and
/// always set to `null` (or `0` for `transaction_type`) so the row shape is
/// the same across sources.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTransactionRecord {
    pub hash: String,
    pub block_number: u64,
    pub block_hash: String,
    /// Unix seconds; `0` when the node has no block time.
    pub block_timestamp: i64,
    pub transaction_index: u64,
    pub from_address: String,
    /// Empty when the transaction references a single account.
    pub to_address: String,
    /// Lamports credited to the second account, clipped at zero.
    #[serde_as(as = "DisplayFromStr")]
    pub value: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub fee: u64,
    /// `1` when no execution error was reported.
    pub status: u8,
    /// JSON of the message's instruction list.
    pub instructions_payload: String,
    pub nonce: Option<u64>,
    pub contract_address: Option<String>,
    pub gas_price: Option<u64>,
    pub max_fee_per_gas: Option<u64>,
    pub max_priority_fee_per_gas: Option<u64>,
    pub transaction_type: u8,
    pub source: String,
    /// Processing time, not chain time.
    pub created_at: DateTime<Utc>,
}

/// One row per top-level instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstructionRecord {
    pub block_id: u64,
    pub tx_id: String,
    pub instruction_index: u64,
    pub signer: BTreeSet<String>,
    pub program_id: String,
    pub event_type: EventType,
    pub decoded_instruction: Option<DecodedInstruction>,
}

/// A record of either granularity. Serialized without a tag so each element
/// of the output array is the bare record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Transaction(CanonicalTransactionRecord),
    Instruction(ParsedInstructionRecord),
}

impl Record {
    pub fn slot(&self) -> u64 {
        match self {
            Self::Transaction(tx) => tx.block_number,
            Self::Instruction(ix) => ix.block_id,
        }
    }

    pub fn signature(&self) -> &str {
        match self {
            Self::Transaction(tx) => &tx.hash,
            Self::Instruction(ix) => &ix.tx_id,
        }
    }

    /// Only instruction records carry an event type.
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Self::Transaction(_) => None,
            Self::Instruction(ix) => Some(ix.event_type),
        }
    }
}
