use serde::{Deserialize, Serialize};

use crate::programs::system::SystemDecoder;
use crate::programs::token::TokenDecoder;
use crate::programs::{DecodedInstruction, EventType, Program};
use crate::types::{CompiledInstruction, PartiallyDecodedInstruction, RawInstruction};

/// Outcome of classifying one instruction. Always produced, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub event_type: EventType,
    pub detail: Option<DecodedInstruction>,
}

pub trait ProgramDecoder: Sync {
    fn program(&self) -> Program;

    /// Decodes node-parsed JSON into a known event, or `None` when the
    /// payload is not one this decoder recognises.
    fn decode(&self, parsed: &serde_json::Value) -> Option<(EventType, DecodedInstruction)>;
}

pub fn decoder_for(program: Program) -> &'static dyn ProgramDecoder {
    match program {
        Program::System => &SystemDecoder,
        Program::Token => &TokenDecoder,
    }
}

/// Dispatches on `program_id` first, then falls back to the raw payload.
pub fn classify(program_id: &str, ix: &RawInstruction) -> Classification {
    if let RawInstruction::Parsed(parsed) = ix
        && let Some(program) = Program::from_program_id(program_id)
    {
        if let Some((event_type, detail)) = decoder_for(program).decode(&parsed.parsed) {
            return Classification {
                event_type,
                detail: Some(detail),
            };
        }
        tracing::debug!(
            program = program.as_str(),
            "parsed instruction not recognised by its decoder"
        );
    }

    match ix {
        RawInstruction::Parsed(parsed) => Classification {
            event_type: EventType::UnknownInstruction,
            detail: Some(DecodedInstruction::Parsed(stringify_integers(&parsed.parsed))),
        },
        RawInstruction::PartiallyDecoded(PartiallyDecodedInstruction { data, .. })
        | RawInstruction::Compiled(CompiledInstruction { data, .. }) => {
            classify_raw(program_id, data)
        }
    }
}

fn classify_raw(program_id: &str, data: &str) -> Classification {
    match bs58::decode(data).into_vec() {
        Ok(bytes) => Classification {
            event_type: EventType::UnknownInstruction,
            detail: Some(DecodedInstruction::Raw(bytes)),
        },
        Err(err) => {
            tracing::warn!(program_id, %err, "instruction data is not valid base58");
            Classification {
                event_type: EventType::InvalidData,
                detail: None,
            }
        }
    }
}

/// Copy of node JSON with every integer rendered as a decimal string, so
/// lamport and token magnitudes keep full precision downstream.
fn stringify_integers(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Number(n) if n.is_u64() || n.is_i64() => Value::String(n.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(stringify_integers).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), stringify_integers(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::panic,
    reason = "test assertions"
)]
mod tests {
    use super::*;
    use crate::programs::{SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID, TransferDetail};
    use crate::types::ParsedInstruction;

    fn parsed(program_id: &str, parsed: serde_json::Value) -> RawInstruction {
        RawInstruction::Parsed(ParsedInstruction {
            program: None,
            program_id: program_id.to_string(),
            parsed,
        })
    }

    fn opaque(program_id: &str, data: &str) -> RawInstruction {
        RawInstruction::PartiallyDecoded(PartiallyDecodedInstruction {
            program_id: program_id.to_string(),
            accounts: vec![],
            data: data.to_string(),
        })
    }

    fn lamport_transfer(lamports: u64) -> serde_json::Value {
        serde_json::json!({
            "type": "transfer",
            "info": { "source": "A", "destination": "B", "lamports": lamports }
        })
    }

    #[test]
    fn decoder_selection_matches_program() {
        assert_eq!(decoder_for(Program::System).program(), Program::System);
        assert_eq!(decoder_for(Program::Token).program(), Program::Token);
    }

    #[test]
    fn system_transfer_dispatches_to_native_transfer() {
        let result = classify(SYSTEM_PROGRAM_ID, &parsed(SYSTEM_PROGRAM_ID, lamport_transfer(5)));
        assert_eq!(result.event_type, EventType::NativeSolTransfer);
        assert_eq!(
            result.detail,
            Some(DecodedInstruction::Transfer(TransferDetail {
                source: "A".to_string(),
                destination: "B".to_string(),
                amount: 5,
            }))
        );
    }

    #[test]
    fn token_transfer_dispatches_to_token_transfer() {
        let ix = parsed(
            TOKEN_PROGRAM_ID,
            serde_json::json!({
                "type": "transfer",
                "info": { "source": "S", "destination": "D", "authority": "O", "amount": "7" }
            }),
        );
        assert_eq!(
            classify(TOKEN_PROGRAM_ID, &ix).event_type,
            EventType::SplTokenTransfer
        );
    }

    #[test]
    fn dispatch_key_is_program_id_not_payload_shape() {
        let ix = parsed("Vote111111111111111111111111111111111111111", lamport_transfer(5));
        let result = classify("Vote111111111111111111111111111111111111111", &ix);
        assert_eq!(result.event_type, EventType::UnknownInstruction);
        assert_eq!(
            result.detail,
            Some(DecodedInstruction::Parsed(serde_json::json!({
                "type": "transfer",
                "info": { "source": "A", "destination": "B", "lamports": "5" }
            })))
        );
    }

    #[test]
    fn unrecognised_parsed_detail_renders_integers_as_strings() {
        let create = serde_json::json!({
            "type": "createAccount",
            "info": {
                "source": "A",
                "newAccount": "N",
                "lamports": u64::MAX,
                "space": 165,
                "owner": TOKEN_PROGRAM_ID,
                "seeds": [1, 2],
                "ratio": 0.5,
                "rentExempt": true
            }
        });
        let result = classify(SYSTEM_PROGRAM_ID, &parsed(SYSTEM_PROGRAM_ID, create));
        assert_eq!(result.event_type, EventType::UnknownInstruction);
        let Some(DecodedInstruction::Parsed(detail)) = result.detail else {
            panic!("expected parsed detail");
        };
        assert_eq!(detail["info"]["lamports"], "18446744073709551615");
        assert_eq!(detail["info"]["space"], "165");
        assert_eq!(detail["info"]["seeds"], serde_json::json!(["1", "2"]));
        assert_eq!(detail["info"]["ratio"], 0.5);
        assert_eq!(detail["info"]["rentExempt"], true);
        assert_eq!(detail["info"]["owner"], TOKEN_PROGRAM_ID);

        let memo = classify("Memo", &parsed("Memo", serde_json::json!("gm")));
        assert_eq!(
            memo.detail,
            Some(DecodedInstruction::Parsed(serde_json::json!("gm")))
        );
    }

    #[test]
    fn recognised_program_with_unexpected_shape_is_unknown() {
        let result = classify(SYSTEM_PROGRAM_ID, &parsed(SYSTEM_PROGRAM_ID, lamport_transfer(0)));
        assert_eq!(result.event_type, EventType::UnknownInstruction);
    }

    #[test]
    fn opaque_payload_is_base58_decoded() {
        let data = bs58::encode([2_u8, 0, 0, 0, 64, 66, 15, 0]).into_string();
        let result = classify("ComputeBudget111111111111111111111111111111", &opaque("x", &data));
        assert_eq!(result.event_type, EventType::UnknownInstruction);
        assert_eq!(
            result.detail,
            Some(DecodedInstruction::Raw(vec![2, 0, 0, 0, 64, 66, 15, 0]))
        );
    }

    #[test]
    fn undecodable_payload_is_invalid_data() {
        let result = classify("p", &opaque("p", "0OIl"));
        assert_eq!(result.event_type, EventType::InvalidData);
        assert!(result.detail.is_none());
    }

    #[test]
    fn classification_is_deterministic() {
        let inputs = [
            (SYSTEM_PROGRAM_ID, parsed(SYSTEM_PROGRAM_ID, lamport_transfer(9))),
            ("p", opaque("p", "3DdGGhkhJbjm")),
            ("p", opaque("p", "not*base58")),
        ];
        for (program_id, ix) in &inputs {
            let first = classify(program_id, ix);
            for _ in 0..10 {
                assert_eq!(classify(program_id, ix), first);
            }
        }
        let json = serde_json::to_value(classify("p", &inputs[1].1)).unwrap();
        assert_eq!(json["event_type"], serde_json::json!("UnknownInstruction"));
    }
}
