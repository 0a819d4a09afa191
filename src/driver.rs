//! Distribution Driver (Component F, §4.F): the end-to-end close sequence
//! for one vault, composing the Query Client, Earnings Calculator, Merkle
//! Engine, Snapshot Store and On-Chain Publisher.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;

use crate::chain::OnChainPublisher;
use crate::domain::{parse_biguint, Address, Entry};
use crate::earnings::project_entry;
use crate::error::Result;
use crate::indexer::{
    query_account_subsidies_for_vault, query_current_active_epoch, query_epoch_by_number, QueryClient,
};
use crate::merkle::{biguint_to_u256, build_tree};
use crate::store::{Snapshot, SnapshotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Idle,
    Ingesting,
    Computing,
    Persisted,
    Published,
    Finalized,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionResult {
    #[serde(with = "crate::domain::biguint_decimal")]
    pub total: BigUint,
    pub accounts: usize,
    pub root: String,
}

impl DistributionResult {
    fn empty() -> Self {
        Self {
            total: BigUint::zero(),
            accounts: 0,
            root: String::new(),
        }
    }
}

/// Closes `vault`'s distribution for `epoch_number`, defaulting to the
/// vault's current active epoch when `None` (§4.F). If no active epoch
/// exists either, falls back to a live preview against the current wall
/// clock that persists no snapshot and finalizes nothing.
pub async fn close_epoch(
    query: &dyn QueryClient,
    store: &SnapshotStore,
    publisher: &dyn OnChainPublisher,
    vault: Address,
    epoch_number: Option<u64>,
) -> Result<DistributionResult> {
    let mut state = DriverState::Idle;

    state = transition(state, DriverState::Ingesting);
    let accruals = query_account_subsidies_for_vault(query, &vault.to_lower_hex()).await?;
    let accruals: Vec<_> = accruals
        .into_iter()
        .filter(|a| {
            parse_biguint("seconds_accumulated", &a.seconds_accumulated)
                .map(|v| !v.is_zero())
                .unwrap_or(false)
        })
        .collect();

    if accruals.is_empty() {
        return Ok(DistributionResult::empty());
    }

    state = transition(state, DriverState::Computing);
    let (epoch_number, projection_timestamp) = match epoch_number {
        Some(epoch_number) => {
            let epoch = query_epoch_by_number(query, &epoch_number.to_string()).await?;
            let ts = epoch
                .map(|e| e.close_projection_timestamp())
                .unwrap_or_else(|| chrono::Utc::now().timestamp());
            (Some(epoch_number), ts)
        }
        None => match query_current_active_epoch(query).await? {
            Some(epoch) => {
                let ts = epoch.close_projection_timestamp();
                let parsed = epoch.epoch_number.parse::<u64>().map_err(|_| {
                    crate::error::OrchestratorError::QueryDecodeError(format!(
                        "non-numeric active epoch_number {}",
                        epoch.epoch_number
                    ))
                })?;
                (Some(parsed), ts)
            }
            None => (None, chrono::Utc::now().timestamp()),
        },
    };

    let mut entries: Vec<Entry> = Vec::with_capacity(accruals.len());
    for accrual in &accruals {
        if let Some(entry) = project_entry(accrual, projection_timestamp)? {
            entries.push(entry);
        }
    }

    if entries.is_empty() {
        return Ok(DistributionResult::empty());
    }

    let tree = build_tree(&entries)?;
    let root = tree.root();
    let root_hex = format!("0x{}", hex::encode(root));
    let total = entries.iter().fold(BigUint::zero(), |acc, e| acc + &e.total_earned);

    if let Some(epoch_number) = epoch_number {
        state = transition(state, DriverState::Persisted);
        let snapshot = Snapshot {
            vault_id: vault.to_lower_hex(),
            epoch_number: epoch_number.to_string(),
            entries: entries.clone(),
            merkle_root_hex: root_hex.clone(),
            block_number: 0,
            timestamp: projection_timestamp,
            created_at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = store.save_snapshot(&snapshot) {
            tracing::warn!(
                vault = %vault,
                epoch = epoch_number,
                error = %e,
                "snapshot write failed; proceeding to publish anyway"
            );
        }
    }

    let total_u256 = biguint_to_u256(&total)?;

    match publisher
        .update_merkle_root_and_wait_for_confirmation(vault, root, total_u256)
        .await
    {
        Ok(()) => {
            state = transition(state, DriverState::Published);
        }
        Err(e) => {
            transition(state, DriverState::Aborted);
            return Err(e);
        }
    }

    if let Some(epoch_number) = epoch_number {
        match publisher
            .end_epoch_with_subsidies(epoch_number, vault, root, total_u256)
            .await
        {
            Ok(()) => {
                transition(state, DriverState::Finalized);
            }
            Err(e) => {
                transition(state, DriverState::Aborted);
                return Err(e);
            }
        }
    }

    Ok(DistributionResult {
        total,
        accounts: entries.len(),
        root: root_hex,
    })
}

fn transition(from: DriverState, to: DriverState) -> DriverState {
    tracing::debug!(from = ?from, to = ?to, "driver state transition");
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountAccrual, Epoch, EpochStatus};
    use crate::error::OrchestratorError;
    use async_trait::async_trait;
    use ethereum_types::U256;
    use serde_json::Value;
    use std::sync::Mutex;

    struct FakeQueryClient {
        accruals: Vec<AccountAccrual>,
        active_epoch: Option<Epoch>,
    }

    impl FakeQueryClient {
        fn with_accruals(accruals: Vec<AccountAccrual>) -> Self {
            Self {
                accruals,
                active_epoch: None,
            }
        }
    }

    #[async_trait]
    impl QueryClient for FakeQueryClient {
        async fn execute_query(&self, _query: &str, _variables: Value) -> Result<Value> {
            let epoches = match &self.active_epoch {
                Some(epoch) => vec![serde_json::to_value(epoch).unwrap()],
                None => vec![],
            };
            Ok(serde_json::json!({ "epoches": epoches }))
        }
        async fn execute_query_at_block(
            &self,
            _query: &str,
            _variables: Value,
            _block: u64,
        ) -> Result<Value> {
            unimplemented!()
        }
        async fn execute_paginated_query(
            &self,
            _query: &str,
            _variables: Value,
            entity_field: &str,
        ) -> Result<Value> {
            assert_eq!(entity_field, "accountSubsidies");
            Ok(serde_json::json!({ "accountSubsidies": self.accruals }))
        }
        async fn execute_paginated_query_at_block(
            &self,
            _query: &str,
            _variables: Value,
            _entity_field: &str,
            _block: u64,
        ) -> Result<Value> {
            unimplemented!()
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    struct RecordingPublisher {
        published: Mutex<Vec<(Address, [u8; 32], U256)>>,
        finalized: Mutex<Vec<u64>>,
        fail_publish: bool,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                finalized: Mutex::new(Vec::new()),
                fail_publish: false,
            }
        }
    }

    #[async_trait]
    impl OnChainPublisher for RecordingPublisher {
        async fn start_epoch(&self) -> Result<()> {
            Ok(())
        }
        async fn end_epoch_with_subsidies(
            &self,
            epoch_number: u64,
            _vault: Address,
            _root: [u8; 32],
            _total: U256,
        ) -> Result<()> {
            self.finalized.lock().unwrap().push(epoch_number);
            Ok(())
        }
        async fn force_end_epoch_with_zero_yield(&self, _epoch_number: u64, _vault: Address) -> Result<()> {
            Ok(())
        }
        async fn update_merkle_root(&self, _vault: Address, _root: [u8; 32], _total: U256) -> Result<()> {
            Ok(())
        }
        async fn update_merkle_root_and_wait_for_confirmation(
            &self,
            vault: Address,
            root: [u8; 32],
            total: U256,
        ) -> Result<()> {
            if self.fail_publish {
                return Err(OrchestratorError::OnChainRevertError("boom".to_string()));
            }
            self.published.lock().unwrap().push((vault, root, total));
            Ok(())
        }
        async fn allocate_yield_to_epoch(&self, _amount: U256) -> Result<()> {
            Ok(())
        }
        async fn allocate_cumulative_yield_to_epoch(
            &self,
            _epoch_number: u64,
            _cumulative_amount: U256,
        ) -> Result<()> {
            Ok(())
        }
        async fn get_current_epoch_id(&self) -> Result<U256> {
            Ok(U256::zero())
        }
        async fn update_exchange_rate(&self) -> Result<()> {
            Ok(())
        }
    }

    fn sample_accrual(account: &str, seconds: &str) -> AccountAccrual {
        AccountAccrual {
            account_id: account.to_string(),
            seconds_accumulated: seconds.to_string(),
            last_effective_value: "1000000000000000000".to_string(),
            updated_at_timestamp: 1_700_000_000,
            total_rewards_earned: None,
        }
    }

    fn vault() -> Address {
        Address::parse("0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3").unwrap()
    }

    #[tokio::test]
    async fn no_accruals_is_a_no_op_result() {
        let query = FakeQueryClient::with_accruals(vec![]);
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(sled::open(dir.path()).unwrap());
        let publisher = RecordingPublisher::new();

        let result = close_epoch(&query, &store, &publisher, vault(), None).await.unwrap();
        assert_eq!(result.accounts, 0);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_seconds_accrual_is_filtered_before_projection() {
        let query = FakeQueryClient::with_accruals(vec![sample_accrual(
            "0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3",
            "0",
        )]);
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(sled::open(dir.path()).unwrap());
        let publisher = RecordingPublisher::new();

        let result = close_epoch(&query, &store, &publisher, vault(), None).await.unwrap();
        assert_eq!(result.accounts, 0);
    }

    #[tokio::test]
    async fn explicit_epoch_writes_a_snapshot_and_finalizes() {
        let query = FakeQueryClient::with_accruals(vec![sample_accrual(
            "0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3",
            "439236",
        )]);
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(sled::open(dir.path()).unwrap());
        let publisher = RecordingPublisher::new();

        let result = close_epoch(&query, &store, &publisher, vault(), Some(16))
            .await
            .unwrap();
        assert_eq!(result.accounts, 1);
        assert_eq!(publisher.finalized.lock().unwrap().as_slice(), &[16]);

        let snapshot = store.get_snapshot(&vault().to_lower_hex(), "16").unwrap();
        assert_eq!(snapshot.entries.len(), 1);
    }

    #[tokio::test]
    async fn no_target_epoch_defaults_to_the_current_active_epoch() {
        let mut query = FakeQueryClient::with_accruals(vec![sample_accrual(
            "0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3",
            "439236",
        )]);
        query.active_epoch = Some(Epoch {
            epoch_number: "21".to_string(),
            status: EpochStatus::Active,
            start_timestamp: 1_700_000_000,
            end_timestamp: 1_700_100_000,
            processing_completed_timestamp: Some(1_700_050_000),
            created_at_block: 10,
            updated_at_block: 10,
        });
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(sled::open(dir.path()).unwrap());
        let publisher = RecordingPublisher::new();

        let result = close_epoch(&query, &store, &publisher, vault(), None)
            .await
            .unwrap();
        assert_eq!(result.accounts, 1);
        assert_eq!(publisher.finalized.lock().unwrap().as_slice(), &[21]);

        let snapshot = store.get_snapshot(&vault().to_lower_hex(), "21").unwrap();
        assert_eq!(snapshot.entries.len(), 1);
    }

    #[tokio::test]
    async fn no_target_epoch_without_an_active_epoch_is_a_live_preview() {
        let query = FakeQueryClient::with_accruals(vec![sample_accrual(
            "0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3",
            "439236",
        )]);
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(sled::open(dir.path()).unwrap());
        let publisher = RecordingPublisher::new();

        let result = close_epoch(&query, &store, &publisher, vault(), None)
            .await
            .unwrap();
        assert_eq!(result.accounts, 1);
        assert!(publisher.finalized.lock().unwrap().is_empty());
        assert!(store.list_snapshots(&vault().to_lower_hex(), 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_fatal_and_skips_finalization() {
        let query = FakeQueryClient::with_accruals(vec![sample_accrual(
            "0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3",
            "439236",
        )]);
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(sled::open(dir.path()).unwrap());
        let mut publisher = RecordingPublisher::new();
        publisher.fail_publish = true;

        let err = close_epoch(&query, &store, &publisher, vault(), Some(16))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::OnChainRevertError(_)));
        assert!(publisher.finalized.lock().unwrap().is_empty());
    }
}
