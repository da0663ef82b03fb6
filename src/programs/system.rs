use strum::VariantNames;

use crate::classifier::ProgramDecoder;
use crate::programs::{
    DecodedInstruction, EventType, Program, TransferDetail, contains_known_variant,
};

/// `jsonParsed` output of the system program, `{"type": .., "info": ..}`.
#[derive(serde::Deserialize, strum_macros::VariantNames)]
#[serde(tag = "type", content = "info", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
#[expect(
    dead_code,
    reason = "variant data consumed by serde, not read directly"
)]
pub(crate) enum SystemInstructionKind {
    CreateAccount(serde_json::Value),
    CreateAccountWithSeed(serde_json::Value),
    Assign(serde_json::Value),
    AssignWithSeed(serde_json::Value),
    Transfer(LamportTransfer),
    TransferWithSeed(LamportTransfer),
    AdvanceNonce(serde_json::Value),
    WithdrawFromNonce(serde_json::Value),
    InitializeNonce(serde_json::Value),
    AuthorizeNonce(serde_json::Value),
    UpgradeNonce(serde_json::Value),
    Allocate(serde_json::Value),
    AllocateWithSeed(serde_json::Value),
}

#[derive(serde::Deserialize)]
pub(crate) struct LamportTransfer {
    source: String,
    destination: String,
    lamports: u64,
}

#[derive(Debug)]
pub struct SystemDecoder;

impl ProgramDecoder for SystemDecoder {
    fn program(&self) -> Program {
        Program::System
    }

    fn decode(&self, parsed: &serde_json::Value) -> Option<(EventType, DecodedInstruction)> {
        classify_parsed_envelope(parsed)
    }
}

pub fn classify_parsed_envelope(
    parsed: &serde_json::Value,
) -> Option<(EventType, DecodedInstruction)> {
    let kind: SystemInstructionKind = match serde_json::from_value(parsed.clone()) {
        Ok(kind) => kind,
        Err(err) => {
            if contains_known_variant(parsed, SystemInstructionKind::VARIANTS) {
                tracing::debug!(%err, "system instruction did not match its expected shape");
            }
            return None;
        }
    };

    match kind {
        SystemInstructionKind::Transfer(transfer)
        | SystemInstructionKind::TransferWithSeed(transfer) => native_transfer(transfer),
        _ => None,
    }
}

fn native_transfer(
    LamportTransfer {
        source,
        destination,
        lamports,
    }: LamportTransfer,
) -> Option<(EventType, DecodedInstruction)> {
    if lamports == 0 {
        return None;
    }
    Some((
        EventType::NativeSolTransfer,
        DecodedInstruction::Transfer(TransferDetail {
            source,
            destination,
            amount: lamports,
        }),
    ))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;

    #[test]
    fn transfer_with_lamports_is_native_transfer() {
        let parsed = serde_json::json!({
            "type": "transfer",
            "info": {
                "source": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
                "destination": "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1",
                "lamports": 1_500_000_000_u64
            }
        });
        let (event_type, detail) = classify_parsed_envelope(&parsed).unwrap();
        assert_eq!(event_type, EventType::NativeSolTransfer);
        assert_eq!(
            detail,
            DecodedInstruction::Transfer(TransferDetail {
                source: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string(),
                destination: "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1".to_string(),
                amount: 1_500_000_000,
            })
        );
    }

    #[test]
    fn transfer_with_seed_counts_as_native_transfer() {
        let parsed = serde_json::json!({
            "type": "transferWithSeed",
            "info": {
                "source": "src",
                "sourceBase": "base",
                "destination": "dst",
                "lamports": 42,
                "sourceSeed": "seed",
                "sourceOwner": "owner"
            }
        });
        let (event_type, _) = classify_parsed_envelope(&parsed).unwrap();
        assert_eq!(event_type, EventType::NativeSolTransfer);
    }

    #[test]
    fn zero_lamport_transfer_is_not_classified() {
        let parsed = serde_json::json!({
            "type": "transfer",
            "info": { "source": "a", "destination": "b", "lamports": 0 }
        });
        assert!(classify_parsed_envelope(&parsed).is_none());
    }

    #[test]
    fn other_system_instructions_are_not_transfers() {
        let parsed = serde_json::json!({
            "type": "createAccount",
            "info": {
                "source": "payer",
                "newAccount": "acct",
                "lamports": 2_039_280,
                "space": 165,
                "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
            }
        });
        assert!(classify_parsed_envelope(&parsed).is_none());
    }

    #[test]
    fn malformed_transfer_is_not_classified() {
        let parsed = serde_json::json!({
            "type": "transfer",
            "info": { "source": "a", "lamports": 5 }
        });
        assert!(classify_parsed_envelope(&parsed).is_none());
        assert!(classify_parsed_envelope(&serde_json::json!({ "type": "mystery" })).is_none());
    }

    #[test]
    fn mirror_enum_covers_parser_variants() {
        let names = [
            "createAccount",
            "createAccountWithSeed",
            "assign",
            "assignWithSeed",
            "advanceNonce",
            "withdrawFromNonce",
            "initializeNonce",
            "authorizeNonce",
            "upgradeNonce",
            "allocate",
            "allocateWithSeed",
        ];
        for name in names {
            let json = serde_json::json!({ "type": name, "info": {} });
            assert!(
                serde_json::from_value::<SystemInstructionKind>(json).is_ok(),
                "SystemInstructionKind missing variant: {name}"
            );
            assert!(SystemInstructionKind::VARIANTS.contains(&name));
        }
    }
}
