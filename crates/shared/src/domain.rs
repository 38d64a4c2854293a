use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Contract-assigned proposal index: stable, zero-based, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger account identifier. Normalized to lowercase on construction so
/// equality never depends on the casing a collaborator happened to return.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Truncated display form: leading six characters, trailing four.
    pub fn short(&self) -> String {
        if self.0.len() <= 12 {
            return self.0.clone();
        }
        match (self.0.get(..6), self.0.get(self.0.len() - 4..)) {
            (Some(head), Some(tail)) => format!("{head}...{tail}"),
            _ => self.0.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Address::new(raw))
    }
}

/// NFT identifier. Serialized as a decimal string on the wire so token ids
/// survive JSON consumers that cannot hold full 64-bit integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u64);

impl Serialize for TokenId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse::<u64>()
            .map(TokenId)
            .map_err(|_| de::Error::custom(format!("invalid token id '{raw}'")))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque transaction identifier issued by the wallet on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-observed proposal lifecycle. One-way; no cancellation or expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
}

impl ProposalStatus {
    pub fn label(self) -> &'static str {
        match self {
            ProposalStatus::Pending => "Pending",
            ProposalStatus::Accepted => "Accepted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Included,
    Reverted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_equality_ignores_case_and_whitespace() {
        assert_eq!(
            Address::new("0xABCdef0123"),
            Address::new("  0xabcDEF0123 ")
        );
    }

    #[test]
    fn address_short_form_truncates_long_identifiers() {
        let address = Address::new("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
        assert_eq!(address.short(), "0xe7f1...0512");
    }

    #[test]
    fn address_short_form_keeps_short_identifiers_whole() {
        assert_eq!(Address::new("0xabc").short(), "0xabc");
    }

    #[test]
    fn token_id_round_trips_as_decimal_string() {
        let encoded = serde_json::to_string(&TokenId(18_446_744_073_709_551_615)).expect("encode");
        assert_eq!(encoded, "\"18446744073709551615\"");
        let decoded: TokenId = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, TokenId(u64::MAX));
    }

    #[test]
    fn token_id_rejects_non_numeric_input() {
        assert!(serde_json::from_str::<TokenId>("\"0xbeef\"").is_err());
    }
}
