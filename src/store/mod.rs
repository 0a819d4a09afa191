//! Snapshot Store (Component D, §4.D). A durable keyed store of `(vault,
//! epoch)` snapshots, backed by `sled`, with a "latest" pointer and
//! reverse-ordered range listing.
//!
//! Grounded on the teacher's `src/vault/store.rs` (sled `Tree` wrapper with
//! small key-formatting helpers returning `anyhow`/crate-local `Result`) and
//! `src/health.rs` (skip-and-log-on-decode-failure iteration).

mod keys;
mod snapshot;

pub use snapshot::Snapshot;

use sled::Db;

use crate::error::{OrchestratorError, Result};

pub struct SnapshotStore {
    db: Db,
}

impl SnapshotStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| OrchestratorError::StoreError(format!("opening store at {path}: {e}")))?;
        Ok(Self::new(db))
    }

    /// Writes the primary snapshot key, then the latest-pointer key. The
    /// pointer write is best-effort: its failure is logged but does not fail
    /// the call, since the snapshot itself is already durable (§4.D).
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let key = keys::snapshot_key(&snapshot.vault_id, &snapshot.epoch_number);
        let value = serde_json::to_vec(snapshot).map_err(|e| {
            OrchestratorError::StoreError(format!("serializing snapshot: {e}"))
        })?;

        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| OrchestratorError::StoreError(format!("writing snapshot: {e}")))?;

        let pointer_key = keys::latest_pointer_key(&snapshot.vault_id);
        if let Err(e) = self
            .db
            .insert(pointer_key.as_bytes(), snapshot.epoch_number.as_bytes())
        {
            tracing::warn!(
                vault = %snapshot.vault_id,
                epoch = %snapshot.epoch_number,
                error = %e,
                "failed to update latest-snapshot pointer; snapshot itself was saved"
            );
        }

        Ok(())
    }

    pub fn get_snapshot(&self, vault: &str, epoch_number: &str) -> Result<Snapshot> {
        let key = keys::snapshot_key(vault, epoch_number);
        let raw = self
            .db
            .get(key.as_bytes())
            .map_err(|e| OrchestratorError::StoreError(format!("reading snapshot: {e}")))?
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!(
                    "no snapshot for vault={vault} epoch={epoch_number}"
                ))
            })?;
        decode_snapshot(&raw)
    }

    pub fn get_latest_snapshot(&self, vault: &str) -> Result<Snapshot> {
        let pointer_key = keys::latest_pointer_key(vault);
        let raw_pointer = self
            .db
            .get(pointer_key.as_bytes())
            .map_err(|e| OrchestratorError::StoreError(format!("reading latest pointer: {e}")))?
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!("no latest snapshot for vault={vault}"))
            })?;
        let epoch_number = String::from_utf8(raw_pointer.to_vec()).map_err(|e| {
            OrchestratorError::StoreError(format!("decoding latest pointer: {e}"))
        })?;
        self.get_snapshot(vault, &epoch_number)
    }

    /// Reverse-ordered prefix iteration over the vault's snapshot namespace.
    /// Keys that fail to decode are logged and skipped rather than
    /// propagated, so an operational hiccup degrades to an under-full result
    /// instead of a dead iterator (§4.D).
    pub fn list_snapshots(&self, vault: &str, limit: usize) -> Result<Vec<Snapshot>> {
        let prefix = keys::snapshot_prefix(vault);
        let mut out = Vec::new();

        for item in self.db.scan_prefix(prefix.as_bytes()).rev() {
            let (key, value) = item
                .map_err(|e| OrchestratorError::StoreError(format!("iterating snapshots: {e}")))?;

            match decode_snapshot(&value) {
                Ok(snapshot) => out.push(snapshot),
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "skipping snapshot that failed to decode"
                    );
                    continue;
                }
            }

            if limit != 0 && out.len() >= limit {
                break;
            }
        }

        Ok(out)
    }
}

fn decode_snapshot(raw: &[u8]) -> Result<Snapshot> {
    serde_json::from_slice(raw)
        .map_err(|e| OrchestratorError::StoreError(format!("decoding snapshot: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Entry};
    use num_bigint::BigUint;

    fn sample_snapshot(vault: &str, epoch: &str) -> Snapshot {
        let entry = Entry::new(
            Address::parse("0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3").unwrap(),
            BigUint::from(100u32),
        )
        .unwrap();
        Snapshot {
            vault_id: vault.to_string(),
            epoch_number: epoch.to_string(),
            entries: vec![entry],
            merkle_root_hex: "0xdead".to_string(),
            block_number: 42,
            timestamp: 1_700_000_000,
            created_at: 1_700_000_001,
        }
    }

    fn temp_store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        (dir, SnapshotStore::new(db))
    }

    #[test]
    fn round_trips_a_snapshot() {
        let (_dir, store) = temp_store();
        let snap = sample_snapshot("0xVault", "16");
        store.save_snapshot(&snap).unwrap();

        let fetched = store.get_snapshot("0xVault", "16").unwrap();
        assert_eq!(fetched.entries, snap.entries);
        assert_eq!(fetched.merkle_root_hex, snap.merkle_root_hex);
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let (_dir, store) = temp_store();
        let err = store.get_snapshot("0xVault", "99").unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[test]
    fn latest_pointer_follows_sequential_saves() {
        let (_dir, store) = temp_store();
        store.save_snapshot(&sample_snapshot("0xVault", "16")).unwrap();
        store.save_snapshot(&sample_snapshot("0xVault", "17")).unwrap();

        let latest = store.get_latest_snapshot("0xVault").unwrap();
        assert_eq!(latest.epoch_number, "17");

        let historical = store.get_snapshot("0xVault", "16").unwrap();
        assert_eq!(historical.merkle_root_hex, "0xdead");
    }

    #[test]
    fn list_snapshots_is_descending_by_epoch() {
        let (_dir, store) = temp_store();
        for epoch in ["16", "17", "9"] {
            store.save_snapshot(&sample_snapshot("0xVault", epoch)).unwrap();
        }

        let listed = store.list_snapshots("0xVault", 0).unwrap();
        let epochs: Vec<&str> = listed.iter().map(|s| s.epoch_number.as_str()).collect();
        assert_eq!(epochs, vec!["17", "16", "9"]);
    }

    #[test]
    fn list_snapshots_respects_limit() {
        let (_dir, store) = temp_store();
        for epoch in ["1", "2", "3"] {
            store.save_snapshot(&sample_snapshot("0xVault", epoch)).unwrap();
        }
        let listed = store.list_snapshots("0xVault", 2).unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn snapshots_are_namespaced_per_vault() {
        let (_dir, store) = temp_store();
        store.save_snapshot(&sample_snapshot("0xAAA", "1")).unwrap();
        store.save_snapshot(&sample_snapshot("0xBBB", "1")).unwrap();

        assert_eq!(store.list_snapshots("0xAAA", 0).unwrap().len(), 1);
        assert_eq!(store.list_snapshots("0xBBB", 0).unwrap().len(), 1);
    }
}
