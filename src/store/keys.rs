//! Key layout for the snapshot store (§4.D). This is an external contract —
//! readers and writers of the same `sled::Db` must agree on it byte-for-byte.

/// Width the decimal epoch number is zero-padded to inside snapshot keys, so
/// that lexicographic (byte) ordering of keys matches numeric ordering of
/// epochs under prefix iteration.
const EPOCH_KEY_WIDTH: usize = 20;

pub fn snapshot_prefix(vault: &str) -> String {
    format!("merkle:snapshot:vault:{}:epoch:", vault.to_lowercase())
}

pub fn snapshot_key(vault: &str, epoch_number: &str) -> String {
    format!(
        "{}{:0>width$}",
        snapshot_prefix(vault),
        epoch_number,
        width = EPOCH_KEY_WIDTH
    )
}

pub fn latest_pointer_key(vault: &str) -> String {
    format!("merkle:latest:vault:{}", vault.to_lowercase())
}

/// Recovers the unpadded decimal epoch number from a snapshot key produced by
/// `snapshot_key`.
pub fn epoch_number_from_key(vault: &str, key: &str) -> Option<String> {
    let padded = key.strip_prefix(&snapshot_prefix(vault))?;
    let trimmed = padded.trim_start_matches('0');
    Some(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
}
