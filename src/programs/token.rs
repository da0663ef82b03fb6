use serde_with::{DisplayFromStr, serde_as};
use strum::VariantNames;

use crate::classifier::ProgramDecoder;
use crate::programs::{
    DecodedInstruction, EventType, Program, TransferDetail, contains_known_variant,
};

/// `jsonParsed` output of the SPL token program.
#[derive(serde::Deserialize, strum_macros::VariantNames)]
#[serde(tag = "type", content = "info", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
#[expect(
    dead_code,
    reason = "variant data consumed by serde, not read directly"
)]
pub(crate) enum TokenInstructionKind {
    InitializeMint(serde_json::Value),
    InitializeMint2(serde_json::Value),
    InitializeAccount(serde_json::Value),
    InitializeAccount2(serde_json::Value),
    InitializeAccount3(serde_json::Value),
    InitializeMultisig(serde_json::Value),
    InitializeMultisig2(serde_json::Value),
    Transfer(TokenTransfer),
    Approve(serde_json::Value),
    Revoke(serde_json::Value),
    SetAuthority(serde_json::Value),
    MintTo(serde_json::Value),
    Burn(serde_json::Value),
    CloseAccount(serde_json::Value),
    FreezeAccount(serde_json::Value),
    ThawAccount(serde_json::Value),
    TransferChecked(serde_json::Value),
    ApproveChecked(serde_json::Value),
    MintToChecked(serde_json::Value),
    BurnChecked(serde_json::Value),
    SyncNative(serde_json::Value),
    GetAccountDataSize(serde_json::Value),
    InitializeImmutableOwner(serde_json::Value),
    AmountToUiAmount(serde_json::Value),
    UiAmountToAmount(serde_json::Value),
}

/// The parser renders `amount` as a decimal string.
#[serde_as]
#[derive(serde::Deserialize)]
pub(crate) struct TokenTransfer {
    source: String,
    destination: String,
    #[serde_as(as = "DisplayFromStr")]
    amount: u64,
}

#[derive(Debug)]
pub struct TokenDecoder;

impl ProgramDecoder for TokenDecoder {
    fn program(&self) -> Program {
        Program::Token
    }

    fn decode(&self, parsed: &serde_json::Value) -> Option<(EventType, DecodedInstruction)> {
        classify_parsed_envelope(parsed)
    }
}

pub fn classify_parsed_envelope(
    parsed: &serde_json::Value,
) -> Option<(EventType, DecodedInstruction)> {
    let kind: TokenInstructionKind = match serde_json::from_value(parsed.clone()) {
        Ok(kind) => kind,
        Err(err) => {
            if contains_known_variant(parsed, TokenInstructionKind::VARIANTS) {
                tracing::debug!(%err, "token instruction did not match its expected shape");
            }
            return None;
        }
    };

    match kind {
        TokenInstructionKind::Transfer(TokenTransfer {
            source,
            destination,
            amount,
        }) => Some((
            EventType::SplTokenTransfer,
            DecodedInstruction::Transfer(TransferDetail {
                source,
                destination,
                amount,
            }),
        )),
        _ => None,
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;

    #[test]
    fn transfer_is_token_transfer() {
        let parsed = serde_json::json!({
            "type": "transfer",
            "info": {
                "source": "7UX2i7SucgLMQcfZ75s3VXmZZY4YRUyJN9X1RgfMoDUi",
                "destination": "2xNweLHLqrbx4zo1waDvgWJHgsUpPj8Y8icbAFeR4a8i",
                "authority": "CuieVDEDtLo7FypA9SbLM9saXFdb1dsshEkyErMqkRQq",
                "amount": "250000000000"
            }
        });
        let (event_type, detail) = classify_parsed_envelope(&parsed).unwrap();
        assert_eq!(event_type, EventType::SplTokenTransfer);
        let DecodedInstruction::Transfer(transfer) = detail else {
            panic!("expected Transfer detail");
        };
        assert_eq!(transfer.amount, 250_000_000_000);
        assert_eq!(transfer.source, "7UX2i7SucgLMQcfZ75s3VXmZZY4YRUyJN9X1RgfMoDUi");
    }

    #[test]
    fn multisig_transfer_still_decodes() {
        let parsed = serde_json::json!({
            "type": "transfer",
            "info": {
                "source": "s",
                "destination": "d",
                "multisigAuthority": "m",
                "signers": ["x", "y"],
                "amount": "1"
            }
        });
        let (event_type, _) = classify_parsed_envelope(&parsed).unwrap();
        assert_eq!(event_type, EventType::SplTokenTransfer);
    }

    #[test]
    fn transfer_checked_is_not_plain_transfer() {
        let parsed = serde_json::json!({
            "type": "transferChecked",
            "info": {
                "source": "s",
                "destination": "d",
                "mint": "m",
                "authority": "a",
                "tokenAmount": { "amount": "10", "decimals": 6, "uiAmount": 0.00001, "uiAmountString": "0.00001" }
            }
        });
        assert!(classify_parsed_envelope(&parsed).is_none());
    }

    #[test]
    fn non_numeric_amount_is_not_classified() {
        let parsed = serde_json::json!({
            "type": "transfer",
            "info": { "source": "s", "destination": "d", "amount": "lots" }
        });
        assert!(classify_parsed_envelope(&parsed).is_none());
    }

    #[test]
    fn mirror_enum_covers_parser_variants() {
        for name in TokenInstructionKind::VARIANTS {
            if *name == "transfer" {
                continue;
            }
            let json = serde_json::json!({ "type": name, "info": {} });
            assert!(
                serde_json::from_value::<TokenInstructionKind>(json).is_ok(),
                "TokenInstructionKind cannot decode its own variant: {name}"
            );
        }
        assert!(TokenInstructionKind::VARIANTS.contains(&"initializeMint2"));
        assert!(TokenInstructionKind::VARIANTS.contains(&"uiAmountToAmount"));
    }
}
