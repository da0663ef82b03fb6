pub mod system;
pub mod token;

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Programs with a dedicated decoder. Everything else is classified from its
/// raw payload only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    System,
    Token,
}

impl Program {
    pub fn from_program_id(program_id: &str) -> Option<Self> {
        match program_id {
            SYSTEM_PROGRAM_ID => Some(Self::System),
            TOKEN_PROGRAM_ID => Some(Self::Token),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Token => "spl-token",
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
pub enum EventType {
    #[serde(rename = "NativeSOLTransfer")]
    #[strum(serialize = "NativeSOLTransfer")]
    NativeSolTransfer,
    #[serde(rename = "SPLTokenTransfer")]
    #[strum(serialize = "SPLTokenTransfer")]
    SplTokenTransfer,
    UnknownInstruction,
    InvalidData,
}

impl EventType {
    pub fn is_known_transfer(self) -> bool {
        matches!(self, Self::NativeSolTransfer | Self::SplTokenTransfer)
    }
}

/// Movement of value between two accounts, common to native and token
/// transfers. `amount` is lamports or raw token units.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDetail {
    pub source: String,
    pub destination: String,
    #[serde_as(as = "DisplayFromStr")]
    pub amount: u64,
}

/// Event-specific payload attached to a classified instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecodedInstruction {
    Transfer(TransferDetail),
    /// Base58-decoded instruction data of an unrecognised instruction.
    Raw(Vec<u8>),
    /// Node-parsed JSON that no decoder accepted.
    Parsed(serde_json::Value),
}

/// True when `parsed` is a `{"type": .., "info": ..}` envelope whose type is
/// one of `variants`, i.e. a known instruction that failed to decode.
pub fn contains_known_variant(parsed: &serde_json::Value, variants: &[&str]) -> bool {
    parsed
        .get("type")
        .and_then(|v| v.as_str())
        .is_some_and(|t| variants.contains(&t))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;

    #[test]
    fn program_lookup_is_exact() {
        assert_eq!(
            Program::from_program_id(SYSTEM_PROGRAM_ID),
            Some(Program::System)
        );
        assert_eq!(
            Program::from_program_id(TOKEN_PROGRAM_ID),
            Some(Program::Token)
        );
        assert_eq!(
            Program::from_program_id("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb"),
            None
        );
        assert_eq!(Program::System.as_str(), "system");
        assert_eq!(Program::Token.as_str(), "spl-token");
    }

    #[test]
    fn event_type_names_match_wire_tags() {
        assert_eq!(EventType::NativeSolTransfer.to_string(), "NativeSOLTransfer");
        assert_eq!(EventType::SplTokenTransfer.as_ref(), "SPLTokenTransfer");
        assert_eq!(
            "UnknownInstruction".parse::<EventType>().ok(),
            Some(EventType::UnknownInstruction)
        );
        assert_eq!(
            serde_json::to_value(EventType::NativeSolTransfer).unwrap(),
            serde_json::json!("NativeSOLTransfer")
        );
        assert!(EventType::SplTokenTransfer.is_known_transfer());
        assert!(!EventType::InvalidData.is_known_transfer());
    }

    #[test]
    fn transfer_amount_serializes_as_decimal_string() {
        let detail = DecodedInstruction::Transfer(TransferDetail {
            source: "a".to_string(),
            destination: "b".to_string(),
            amount: u64::MAX,
        });
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["amount"], serde_json::json!("18446744073709551615"));
        let back: DecodedInstruction = serde_json::from_value(json).unwrap();
        assert_eq!(back, detail);
    }

    #[test]
    fn known_variant_detection_reads_type_tag() {
        let parsed = serde_json::json!({ "type": "transfer", "info": {} });
        assert!(contains_known_variant(&parsed, &["transfer"]));
        assert!(!contains_known_variant(&parsed, &["burn"]));
        assert!(!contains_known_variant(&serde_json::json!("memo text"), &["transfer"]));
    }
}
