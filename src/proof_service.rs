//! Proof Service (Component G, §4.G). Snapshot-first lookup with a
//! recompute fallback for both the live and historical proof paths.

use num_bigint::BigUint;
use serde::Serialize;

use crate::domain::{parse_biguint, Address, Entry};
use crate::earnings::project_entry;
use crate::error::{OrchestratorError, Result};
use crate::indexer::{
    query_account_subsidies_for_vault, query_epoch_by_number,
    query_latest_merkle_distribution_for_vault, QueryClient,
};
use crate::merkle::generate_proof;
use crate::store::SnapshotStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerkleProof {
    pub epoch_number: String,
    pub root: String,
    pub proof: Vec<String>,
    pub leaf_index: usize,
    #[serde(with = "crate::domain::biguint_decimal")]
    pub total_earned: BigUint,
}

fn to_proof(
    epoch_number: String,
    entries: &[Entry],
    address: Address,
) -> Result<MerkleProof> {
    let (proof, leaf_index, root) = generate_proof(entries, address)?;
    let total_earned = entries
        .iter()
        .find(|e| e.address == address)
        .map(|e| e.total_earned.clone())
        .ok_or_else(|| OrchestratorError::NotFound(format!("{address} not present in entry set")))?;

    Ok(MerkleProof {
        epoch_number,
        root: format!("0x{}", hex::encode(root)),
        proof: proof.iter().map(|node| format!("0x{}", hex::encode(node))).collect(),
        leaf_index,
        total_earned,
    })
}

async fn project_live_entries(
    query: &dyn QueryClient,
    vault: &str,
    projection_timestamp: i64,
) -> Result<Vec<Entry>> {
    let accruals = query_account_subsidies_for_vault(query, vault).await?;
    let mut entries = Vec::with_capacity(accruals.len());
    for accrual in &accruals {
        if parse_biguint("seconds_accumulated", &accrual.seconds_accumulated)
            .map(|v| v == BigUint::from(0u32))
            .unwrap_or(true)
        {
            continue;
        }
        if let Some(entry) = project_entry(accrual, projection_timestamp)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Live proof: snapshot-first, recompute fallback via the most recently
/// published on-chain distribution (§4.G).
pub async fn generate_user_merkle_proof(
    query: &dyn QueryClient,
    store: &SnapshotStore,
    vault: Address,
    user: Address,
) -> Result<MerkleProof> {
    let vault_hex = vault.to_lower_hex();

    if let Ok(snapshot) = store.get_latest_snapshot(&vault_hex) {
        return to_proof(snapshot.epoch_number, &snapshot.entries, user);
    }

    let distribution = query_latest_merkle_distribution_for_vault(query, &vault_hex)
        .await?
        .ok_or_else(|| OrchestratorError::NotFound(format!("no published distribution for vault {vault}")))?;

    let epoch = query_epoch_by_number(query, &distribution.epoch_number)
        .await?
        .ok_or_else(|| {
            OrchestratorError::NotFound(format!(
                "epoch {} referenced by distribution log is unknown",
                distribution.epoch_number
            ))
        })?;

    let entries = project_live_entries(query, &vault_hex, epoch.close_projection_timestamp()).await?;
    to_proof(distribution.epoch_number, &entries, user)
}

/// Historical proof for a specific epoch: snapshot-first, recompute
/// fallback using that epoch's own close timestamps (§4.G).
pub async fn generate_historical_merkle_proof(
    query: &dyn QueryClient,
    store: &SnapshotStore,
    vault: Address,
    user: Address,
    epoch_number: &str,
) -> Result<MerkleProof> {
    let vault_hex = vault.to_lower_hex();

    if let Ok(snapshot) = store.get_snapshot(&vault_hex, epoch_number) {
        return to_proof(snapshot.epoch_number, &snapshot.entries, user);
    }

    let epoch = query_epoch_by_number(query, epoch_number)
        .await?
        .ok_or_else(|| OrchestratorError::NotFound(format!("unknown epoch {epoch_number}")))?;

    let entries = project_live_entries(query, &vault_hex, epoch.close_projection_timestamp()).await?;
    to_proof(epoch_number.to_string(), &entries, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Entry;
    use crate::store::Snapshot;

    fn temp_store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        (dir, SnapshotStore::new(db))
    }

    fn vault() -> Address {
        Address::parse("0x0000000000000000000000000000000000000001").unwrap()
    }

    fn user() -> Address {
        Address::parse("0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3").unwrap()
    }

    #[tokio::test]
    async fn snapshot_hit_never_touches_the_query_client() {
        let (_dir, store) = temp_store();
        let entry = Entry::new(user(), BigUint::from(100u32)).unwrap();
        store
            .save_snapshot(&Snapshot {
                vault_id: vault().to_lower_hex(),
                epoch_number: "16".to_string(),
                entries: vec![entry],
                merkle_root_hex: "0xdead".to_string(),
                block_number: 1,
                timestamp: 0,
                created_at: 0,
            })
            .unwrap();

        struct PanicOnQuery;
        #[async_trait::async_trait]
        impl QueryClient for PanicOnQuery {
            async fn execute_query(&self, _q: &str, _v: serde_json::Value) -> Result<serde_json::Value> {
                panic!("should not query")
            }
            async fn execute_query_at_block(
                &self,
                _q: &str,
                _v: serde_json::Value,
                _b: u64,
            ) -> Result<serde_json::Value> {
                panic!("should not query")
            }
            async fn execute_paginated_query(
                &self,
                _q: &str,
                _v: serde_json::Value,
                _e: &str,
            ) -> Result<serde_json::Value> {
                panic!("should not query")
            }
            async fn execute_paginated_query_at_block(
                &self,
                _q: &str,
                _v: serde_json::Value,
                _e: &str,
                _b: u64,
            ) -> Result<serde_json::Value> {
                panic!("should not query")
            }
            async fn health_check(&self) -> Result<bool> {
                panic!("should not query")
            }
        }

        let proof = generate_user_merkle_proof(&PanicOnQuery, &store, vault(), user())
            .await
            .unwrap();
        assert_eq!(proof.epoch_number, "16");
        assert!(proof.proof.is_empty());
    }
}
