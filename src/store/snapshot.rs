use serde::{Deserialize, Serialize};

use crate::domain::Entry;

/// Durable, versioned record of the entries and root computed for one
/// `(vault, epoch)` (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub vault_id: String,
    pub epoch_number: String,
    pub entries: Vec<Entry>,
    pub merkle_root_hex: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub created_at: i64,
}
