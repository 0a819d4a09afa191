//! Core domain types shared across the ingestion, calculation, and Merkle
//! subsystems (§3 of the spec).

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// A 20-byte canonical address. Stored and compared in lowercase hex form so
/// that callers never have to reason about case sensitivity themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        let stripped = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(stripped).map_err(|e| {
            OrchestratorError::InvalidInput(format!("invalid address {raw}: {e}"))
        })?;
        if bytes.len() != 20 {
            return Err(OrchestratorError::InvalidInput(format!(
                "address {raw} must decode to 20 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    pub fn to_lower_hex(self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lower_hex())
    }
}

/// Parses a decimal string into an arbitrary-precision non-negative integer,
/// naming the offending field on failure (`CalcInputError`, §4.B).
pub fn parse_biguint(field: &str, raw: &str) -> Result<BigUint> {
    raw.trim()
        .parse::<BigUint>()
        .map_err(|_| OrchestratorError::CalcInputError {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

/// Per-account accrual row as ingested from the indexed read model (§3).
/// The wire shape aliases every field to camelCase (`indexer/queries.rs`'s
/// `accountSubsidies` wrapper), so decoding needs the matching rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAccrual {
    pub account_id: String,
    pub seconds_accumulated: String,
    pub last_effective_value: String,
    pub updated_at_timestamp: i64,
    #[serde(default)]
    pub total_rewards_earned: Option<String>,
}

/// Epoch accounting window as ingested from the indexed read model (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Epoch {
    pub epoch_number: String,
    pub status: EpochStatus,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    #[serde(default)]
    pub processing_completed_timestamp: Option<i64>,
    pub created_at_block: u64,
    pub updated_at_block: u64,
}

impl Epoch {
    /// The timestamp the "close" projection path uses: the processing
    /// completion time, falling back to the epoch start (§4.F step 3).
    pub fn close_projection_timestamp(&self) -> i64 {
        self.processing_completed_timestamp
            .unwrap_or(self.start_timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EpochStatus {
    Active,
    Completed,
}

/// Derived `(address, total_earned)` pair, the unit of Merkle leaf input
/// (§3). Invariant: never constructed with `total_earned == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub address: Address,
    #[serde(with = "biguint_decimal")]
    pub total_earned: BigUint,
}

impl Entry {
    pub fn new(address: Address, total_earned: BigUint) -> Option<Self> {
        if total_earned == BigUint::from(0u32) {
            return None;
        }
        Some(Self {
            address,
            total_earned,
        })
    }
}

/// Serializes `BigUint` as its decimal string representation so snapshots
/// stay human-inspectable on disk (§4.D).
pub mod biguint_decimal {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<BigUint>().map_err(serde::de::Error::custom)
    }
}
