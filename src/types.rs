use crate::error::Error;

/// A block as returned by `getBlock` with `transactionDetails = full`.
///
/// Transactions are kept as raw JSON so that one malformed entry can be
/// rejected by the normalizer without failing the whole block.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    /// Base58 block hash.
    pub blockhash: String,
    /// Estimated production time in unix seconds, if the node has one.
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub transactions: Vec<serde_json::Value>,
}

/// One entry of `RawBlock::transactions`, decoded.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct RawTransaction {
    pub transaction: RawTransactionBody,
    #[serde(default)]
    pub meta: Option<RawMeta>,
}

impl RawTransaction {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, Error> {
        <Self as serde::Deserialize>::deserialize(value).map_err(|e| Error::Parse {
            reason: format!("malformed transaction: {e}"),
        })
    }

    /// Primary (fee payer) signature.
    pub fn signature(&self) -> Option<&str> {
        self.transaction.signatures.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct RawTransactionBody {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: RawMessage,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub account_keys: Vec<RawAccountKey>,
    #[serde(default)]
    pub header: Option<RawMessageHeader>,
    /// Decoded one at a time with [`RawInstruction::from_value`], so an
    /// unrecognised shape only affects its own entry.
    #[serde(default)]
    pub instructions: Vec<serde_json::Value>,
}

impl RawMessage {
    pub fn account_pubkeys(&self) -> Vec<&str> {
        self.account_keys.iter().map(RawAccountKey::pubkey).collect()
    }

    /// Program of an instruction that did not decode: its `programId`, or its
    /// `programIdIndex` resolved against the key list.
    pub fn raw_program_id<'a>(&'a self, instruction: &'a serde_json::Value) -> Option<&'a str> {
        if let Some(program_id) = instruction.get("programId").and_then(|v| v.as_str()) {
            return Some(program_id);
        }
        let index = instruction.get("programIdIndex")?.as_u64()?;
        self.account_keys
            .get(usize::try_from(index).ok()?)
            .map(RawAccountKey::pubkey)
    }

    /// Signer addresses. `jsonParsed` keys carry an explicit flag; plain keys
    /// fall back to the header's signer count, or the fee payer alone.
    pub fn signers(&self) -> Vec<&str> {
        let flagged: Vec<&str> = self
            .account_keys
            .iter()
            .filter_map(|k| match k {
                RawAccountKey::Parsed { pubkey, signer, .. } if *signer => Some(pubkey.as_str()),
                _ => None,
            })
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }

        let has_parsed = self
            .account_keys
            .iter()
            .any(|k| matches!(k, RawAccountKey::Parsed { .. }));
        if has_parsed {
            return flagged;
        }

        let count = self
            .header
            .as_ref()
            .map_or(1, |h| usize::from(h.num_required_signatures));
        self.account_keys
            .iter()
            .take(count)
            .map(RawAccountKey::pubkey)
            .collect()
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessageHeader {
    pub num_required_signatures: u8,
}

/// `jsonParsed` returns objects, `json` returns bare base58 strings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum RawAccountKey {
    Parsed {
        pubkey: String,
        #[serde(default)]
        signer: bool,
        #[serde(default)]
        writable: bool,
    },
    Plain(String),
}

impl RawAccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            Self::Parsed { pubkey, .. } | Self::Plain(pubkey) => pubkey,
        }
    }
}

/// An instruction in any of the shapes the RPC node can return.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum RawInstruction {
    /// Pre-parsed by the node (`jsonParsed` for a program it understands).
    Parsed(ParsedInstruction),
    /// `jsonParsed` for a program the node cannot parse: opaque base58 data.
    PartiallyDecoded(PartiallyDecodedInstruction),
    /// `json` encoding: program and accounts as indices into the key list.
    Compiled(CompiledInstruction),
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    #[serde(default)]
    pub program: Option<String>,
    pub program_id: String,
    pub parsed: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartiallyDecodedInstruction {
    pub program_id: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    #[serde(default)]
    pub accounts: Vec<u8>,
    pub data: String,
}

impl RawInstruction {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, Error> {
        <Self as serde::Deserialize>::deserialize(value).map_err(|e| Error::Parse {
            reason: format!("unrecognised instruction: {e}"),
        })
    }

    /// Resolves the invoked program. Compiled instructions need the message's
    /// key list; an out-of-range index yields `None`.
    pub fn program_id<'a>(&'a self, account_keys: &'a [RawAccountKey]) -> Option<&'a str> {
        match self {
            Self::Parsed(ix) => Some(&ix.program_id),
            Self::PartiallyDecoded(ix) => Some(&ix.program_id),
            Self::Compiled(ix) => account_keys
                .get(usize::from(ix.program_id_index))
                .map(RawAccountKey::pubkey),
        }
    }

    /// The opaque base58 payload, when the node did not parse the instruction.
    pub fn data(&self) -> Option<&str> {
        match self {
            Self::Parsed(_) => None,
            Self::PartiallyDecoded(ix) => Some(&ix.data),
            Self::Compiled(ix) => Some(&ix.data),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeta {
    /// Execution error; `null` on success.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;

    #[test]
    fn instruction_shapes_resolve_to_matching_variant() {
        let parsed: RawInstruction = serde_json::from_value(serde_json::json!({
            "program": "system",
            "programId": "11111111111111111111111111111111",
            "parsed": { "type": "transfer", "info": {} },
            "stackHeight": null
        }))
        .unwrap();
        assert!(matches!(parsed, RawInstruction::Parsed(_)));

        let partial: RawInstruction = serde_json::from_value(serde_json::json!({
            "programId": "ComputeBudget111111111111111111111111111111",
            "accounts": [],
            "data": "3DdGGhkhJbjm"
        }))
        .unwrap();
        assert!(matches!(partial, RawInstruction::PartiallyDecoded(_)));
        assert_eq!(partial.data(), Some("3DdGGhkhJbjm"));

        let compiled: RawInstruction = serde_json::from_value(serde_json::json!({
            "programIdIndex": 1,
            "accounts": [0],
            "data": "3Bxs4h24hBtQy9rw"
        }))
        .unwrap();
        let keys = vec![
            RawAccountKey::Plain("payer".to_string()),
            RawAccountKey::Plain("prog".to_string()),
        ];
        assert_eq!(compiled.program_id(&keys), Some("prog"));
        assert_eq!(compiled.program_id(&keys[..1]), None);
    }

    #[test]
    fn unrecognised_instruction_keeps_transaction_and_program() {
        let tx = RawTransaction::from_value(&serde_json::json!({
            "transaction": {
                "signatures": ["sig"],
                "message": {
                    "accountKeys": ["A", "B", "P"],
                    "instructions": [
                        { "programIdIndex": 2, "accounts": [0, 1], "data": "3Bxs4h24hBtQy9rw" },
                        { "programIdIndex": 2, "accounts": [0, 1] },
                        { "programId": "Q", "stackHeight": 1 }
                    ]
                }
            }
        }))
        .unwrap();
        let message = &tx.transaction.message;
        assert_eq!(message.instructions.len(), 3);

        assert!(RawInstruction::from_value(&message.instructions[0]).is_ok());
        let err = RawInstruction::from_value(&message.instructions[1]).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(message.raw_program_id(&message.instructions[1]), Some("P"));
        assert_eq!(message.raw_program_id(&message.instructions[2]), Some("Q"));
        assert_eq!(
            message.raw_program_id(&serde_json::json!({ "programIdIndex": 7 })),
            None
        );
        assert_eq!(message.raw_program_id(&serde_json::json!("opaque")), None);
    }

    #[test]
    fn signers_prefer_explicit_flags() {
        let message: RawMessage = serde_json::from_value(serde_json::json!({
            "accountKeys": [
                { "pubkey": "A", "signer": true, "writable": true, "source": "transaction" },
                { "pubkey": "B", "signer": false, "writable": true, "source": "transaction" },
                { "pubkey": "C", "signer": true, "writable": false, "source": "transaction" }
            ],
            "instructions": []
        }))
        .unwrap();
        assert_eq!(message.signers(), vec!["A", "C"]);
        assert_eq!(message.account_pubkeys(), vec!["A", "B", "C"]);
    }

    #[test]
    fn signers_fall_back_to_header_for_plain_keys() {
        let message: RawMessage = serde_json::from_value(serde_json::json!({
            "accountKeys": ["A", "B", "C"],
            "header": { "numRequiredSignatures": 2, "numReadonlySignedAccounts": 0, "numReadonlyUnsignedAccounts": 1 },
            "instructions": []
        }))
        .unwrap();
        assert_eq!(message.signers(), vec!["A", "B"]);

        let headerless: RawMessage =
            serde_json::from_value(serde_json::json!({ "accountKeys": ["A", "B"] })).unwrap();
        assert_eq!(headerless.signers(), vec!["A"]);
    }

    #[test]
    fn malformed_transaction_is_a_parse_error() {
        let err = RawTransaction::from_value(&serde_json::json!(["AQID", "base64"])).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn meta_null_error_means_success() {
        let meta: RawMeta = serde_json::from_value(serde_json::json!({
            "err": null,
            "fee": 5000,
            "preBalances": [10, 20],
            "postBalances": [5, 25]
        }))
        .unwrap();
        assert!(meta.err.is_none());
        assert_eq!(meta.fee, Some(5000));
    }
}
