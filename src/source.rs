//! Where raw blocks come from.
//!
//! The pipeline only sees [`BlockSource`]; [`RpcBlockSource`] is the JSON-RPC
//! implementation, and tests substitute in-memory doubles.

use std::sync::Arc;

use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcBlockConfig;
use solana_client::rpc_request::RpcError;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_transaction_status::{TransactionDetails, UiTransactionEncoding};

use crate::error::Error;
use crate::types::RawBlock;

const BLOCK_NOT_AVAILABLE: i64 = -32004;
const SLOT_SKIPPED: i64 = -32007;
const LONG_TERM_STORAGE_SLOT_SKIPPED: i64 = -32009;

#[async_trait]
pub trait BlockSource: Send + Sync {
    /// The slot the run starts from. Failure here is fatal for the run.
    async fn current_slot(&self) -> Result<u64, Error>;

    /// `Ok(None)` when the slot has no block (skipped or not retained).
    async fn block(&self, slot: u64) -> Result<Option<RawBlock>, Error>;
}

#[async_trait]
impl<S: BlockSource + ?Sized> BlockSource for Arc<S> {
    async fn current_slot(&self) -> Result<u64, Error> {
        (**self).current_slot().await
    }

    async fn block(&self, slot: u64) -> Result<Option<RawBlock>, Error> {
        (**self).block(slot).await
    }
}

/// `getSlot` / `getBlock` over a shared nonblocking [`RpcClient`].
#[derive(Clone)]
pub struct RpcBlockSource {
    rpc_client: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl RpcBlockSource {
    pub fn new(rpc_client: Arc<RpcClient>, commitment: CommitmentConfig) -> Self {
        Self {
            rpc_client,
            commitment,
        }
    }

    pub fn from_url(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        let client = RpcClient::new_with_commitment(rpc_url.to_string(), commitment);
        Self::new(Arc::new(client), commitment)
    }

    /// Parsed instructions are needed for classification; rewards are never
    /// read; version 0 is the newest transaction format decoded here.
    pub fn block_config(&self) -> RpcBlockConfig {
        RpcBlockConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            transaction_details: Some(TransactionDetails::Full),
            rewards: Some(false),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        }
    }
}

#[async_trait]
impl BlockSource for RpcBlockSource {
    async fn current_slot(&self) -> Result<u64, Error> {
        self.rpc_client
            .get_slot_with_commitment(self.commitment)
            .await
            .map_err(|e| Error::Source {
                reason: format!("getSlot failed: {e}"),
            })
    }

    async fn block(&self, slot: u64) -> Result<Option<RawBlock>, Error> {
        let block = match self
            .rpc_client
            .get_block_with_config(slot, self.block_config())
            .await
        {
            Ok(block) => block,
            Err(e) if is_missing_block(&e) => {
                tracing::debug!(slot, "no block for slot: {e}");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Source {
                    reason: format!("getBlock({slot}) failed: {e}"),
                });
            }
        };

        let value = serde_json::to_value(block)?;
        let raw: RawBlock = serde_json::from_value(value)?;
        Ok(Some(raw))
    }
}

fn is_missing_block(err: &ClientError) -> bool {
    matches!(
        err.kind(),
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. })
            if matches!(*code, BLOCK_NOT_AVAILABLE | SLOT_SKIPPED | LONG_TERM_STORAGE_SLOT_SKIPPED)
    )
}
