//! Typed entity wrappers over `QueryClient` (§4.A). Every query specifies a
//! deterministic order (`orderBy: id, orderDirection: asc`) so pagination
//! never depends on indexer-side iteration order.

use serde_json::{json, Value};

use crate::domain::{AccountAccrual, Epoch};
use crate::error::{OrchestratorError, Result};

use super::client::QueryClient;

pub const INTROSPECTION_QUERY: &str = r#"
    query HealthCheck {
        __schema {
            queryType {
                name
            }
        }
    }
"#;

const ACCOUNTS_QUERY: &str = r#"
    query Accounts($first: Int!, $skip: Int!) {
        accounts(first: $first, skip: $skip, orderBy: id, orderDirection: asc) {
            id
        }
    }
"#;

const ACCOUNT_SUBSIDIES_FOR_VAULT_QUERY: &str = r#"
    query AccountSubsidiesForVault($vault: String!, $first: Int!, $skip: Int!) {
        accountSubsidies(
            where: { vault: $vault }
            first: $first
            skip: $skip
            orderBy: id
            orderDirection: asc
        ) {
            accountId: id
            secondsAccumulated: seconds_accumulated
            lastEffectiveValue: last_effective_value
            updatedAtTimestamp: updated_at_timestamp
            totalRewardsEarned: total_rewards_earned
        }
    }
"#;

const ACCOUNT_SUBSIDIES_AT_BLOCK_QUERY: &str = ACCOUNT_SUBSIDIES_FOR_VAULT_QUERY;

const EPOCH_BY_NUMBER_QUERY: &str = r#"
    query EpochByNumber($epochNumber: String!) {
        epoches(where: { epochNumber: $epochNumber }) {
            epochNumber: epoch_number
            status
            startTimestamp: start_timestamp
            endTimestamp: end_timestamp
            processingCompletedTimestamp: processing_completed_timestamp
            createdAtBlock: created_at_block
            updatedAtBlock: updated_at_block
        }
    }
"#;

const CURRENT_ACTIVE_EPOCH_QUERY: &str = r#"
    query CurrentActiveEpoch {
        epoches(where: { status: ACTIVE }, orderBy: epoch_number, orderDirection: desc, first: 1) {
            epochNumber: epoch_number
            status
            startTimestamp: start_timestamp
            endTimestamp: end_timestamp
            processingCompletedTimestamp: processing_completed_timestamp
            createdAtBlock: created_at_block
            updatedAtBlock: updated_at_block
        }
    }
"#;

const EPOCH_WITH_BLOCK_INFO_QUERY: &str = EPOCH_BY_NUMBER_QUERY;

const MERKLE_DISTRIBUTION_FOR_EPOCH_QUERY: &str = r#"
    query MerkleDistributionForEpoch($vault: String!, $epochNumber: String!) {
        merkleDistributions(
            where: { vault: $vault, epochNumber: $epochNumber }
            orderBy: timestamp
            orderDirection: desc
            first: 1
        ) {
            epochNumber: epoch_number
            root
            total
            timestamp
        }
    }
"#;

const LATEST_MERKLE_DISTRIBUTION_FOR_VAULT_QUERY: &str = r#"
    query LatestMerkleDistributionForVault($vault: String!) {
        merkleDistributions(
            where: { vault: $vault }
            orderBy: timestamp
            orderDirection: desc
            first: 1
        ) {
            epochNumber: epoch_number
            root
            total
            timestamp
        }
    }
"#;

/// Every row of `accounts`, paginated, pinned to no particular block.
pub async fn query_accounts(client: &dyn QueryClient) -> Result<Vec<Value>> {
    let data = client
        .execute_paginated_query(ACCOUNTS_QUERY, json!({}), "accounts")
        .await?;
    rows_of(&data, "accounts")
}

/// Accrual rows for a vault, live (no block pin).
pub async fn query_account_subsidies_for_vault(
    client: &dyn QueryClient,
    vault: &str,
) -> Result<Vec<AccountAccrual>> {
    let data = client
        .execute_paginated_query(
            ACCOUNT_SUBSIDIES_FOR_VAULT_QUERY,
            json!({ "vault": vault }),
            "accountSubsidies",
        )
        .await?;
    decode_rows(&data, "accountSubsidies")
}

/// Accrual rows for a vault, pinned to a specific block for pagination
/// stability (§4.A "Block-pinned paginated queries").
pub async fn query_account_subsidies_at_block(
    client: &dyn QueryClient,
    vault: &str,
    block: u64,
) -> Result<Vec<AccountAccrual>> {
    let data = client
        .execute_paginated_query_at_block(
            ACCOUNT_SUBSIDIES_AT_BLOCK_QUERY,
            json!({ "vault": vault }),
            "accountSubsidies",
            block,
        )
        .await?;
    decode_rows(&data, "accountSubsidies")
}

pub async fn query_epoch_by_number(
    client: &dyn QueryClient,
    epoch_number: &str,
) -> Result<Option<Epoch>> {
    let data = client
        .execute_query(EPOCH_BY_NUMBER_QUERY, json!({ "epochNumber": epoch_number }))
        .await?;
    decode_first(&data, "epoches")
}

pub async fn query_current_active_epoch(client: &dyn QueryClient) -> Result<Option<Epoch>> {
    let data = client
        .execute_query(CURRENT_ACTIVE_EPOCH_QUERY, json!({}))
        .await?;
    decode_first(&data, "epoches")
}

pub async fn query_epoch_with_block_info(
    client: &dyn QueryClient,
    epoch_number: &str,
) -> Result<Option<Epoch>> {
    let data = client
        .execute_query(
            EPOCH_WITH_BLOCK_INFO_QUERY,
            json!({ "epochNumber": epoch_number }),
        )
        .await?;
    decode_first(&data, "epoches")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MerkleDistributionRecord {
    #[serde(rename = "epochNumber")]
    pub epoch_number: String,
    pub root: String,
    pub total: String,
    pub timestamp: i64,
}

pub async fn query_merkle_distribution_for_epoch(
    client: &dyn QueryClient,
    vault: &str,
    epoch_number: &str,
) -> Result<Option<MerkleDistributionRecord>> {
    let data = client
        .execute_query(
            MERKLE_DISTRIBUTION_FOR_EPOCH_QUERY,
            json!({ "vault": vault, "epochNumber": epoch_number }),
        )
        .await?;
    decode_first(&data, "merkleDistributions")
}

/// Most recently published distribution for a vault, with no epoch
/// constraint — used by the Proof Service's live recompute fallback to find
/// which epoch to project against (§4.G).
pub async fn query_latest_merkle_distribution_for_vault(
    client: &dyn QueryClient,
    vault: &str,
) -> Result<Option<MerkleDistributionRecord>> {
    let data = client
        .execute_query(
            LATEST_MERKLE_DISTRIBUTION_FOR_VAULT_QUERY,
            json!({ "vault": vault }),
        )
        .await?;
    decode_first(&data, "merkleDistributions")
}

pub async fn health_check(client: &dyn QueryClient) -> Result<bool> {
    client.health_check().await
}

fn rows_of(data: &Value, entity_field: &str) -> Result<Vec<Value>> {
    data.get(entity_field)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| {
            OrchestratorError::QueryDecodeError(format!("missing `{entity_field}` in response"))
        })
}

fn decode_rows<T: serde::de::DeserializeOwned>(data: &Value, entity_field: &str) -> Result<Vec<T>> {
    let rows = rows_of(data, entity_field)?;
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                OrchestratorError::QueryDecodeError(format!(
                    "decoding `{entity_field}` row: {e}"
                ))
            })
        })
        .collect()
}

fn decode_first<T: serde::de::DeserializeOwned>(
    data: &Value,
    entity_field: &str,
) -> Result<Option<T>> {
    let rows = rows_of(data, entity_field)?;
    rows.into_iter()
        .next()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                OrchestratorError::QueryDecodeError(format!(
                    "decoding `{entity_field}` row: {e}"
                ))
            })
        })
        .transpose()
}
