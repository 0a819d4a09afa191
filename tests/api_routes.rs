//! In-process HTTP surface tests, exercising the real Axum router against
//! fake Query Client / On-Chain Publisher implementations and a throwaway
//! `sled` store, mirroring this codebase's preference for spinning up a real
//! router and driving it with `tower::ServiceExt::oneshot` rather than
//! mocking at the type level for anything above the wire boundary.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ethereum_types::U256;
use serde_json::Value;
use tower::ServiceExt;

use epoch_orchestrator::api::{router, AppState};
use epoch_orchestrator::chain::OnChainPublisher;
use epoch_orchestrator::domain::{Address, Entry};
use epoch_orchestrator::error::Result;
use epoch_orchestrator::indexer::QueryClient;
use epoch_orchestrator::store::{Snapshot, SnapshotStore};

struct EmptyQueryClient;

#[async_trait]
impl QueryClient for EmptyQueryClient {
    async fn execute_query(&self, _query: &str, _variables: Value) -> Result<Value> {
        Ok(serde_json::json!({ "merkleDistributions": [], "epoches": [] }))
    }
    async fn execute_query_at_block(&self, _query: &str, _variables: Value, _block: u64) -> Result<Value> {
        Ok(serde_json::json!({ "merkleDistributions": [], "epoches": [] }))
    }
    async fn execute_paginated_query(
        &self,
        _query: &str,
        _variables: Value,
        entity_field: &str,
    ) -> Result<Value> {
        Ok(serde_json::json!({ entity_field: [] }))
    }
    async fn execute_paginated_query_at_block(
        &self,
        _query: &str,
        _variables: Value,
        entity_field: &str,
        _block: u64,
    ) -> Result<Value> {
        Ok(serde_json::json!({ entity_field: [] }))
    }
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

struct NoopPublisher;

#[async_trait]
impl OnChainPublisher for NoopPublisher {
    async fn start_epoch(&self) -> Result<()> {
        Ok(())
    }
    async fn end_epoch_with_subsidies(&self, _: u64, _: Address, _: [u8; 32], _: U256) -> Result<()> {
        Ok(())
    }
    async fn force_end_epoch_with_zero_yield(&self, _: u64, _: Address) -> Result<()> {
        Ok(())
    }
    async fn update_merkle_root(&self, _: Address, _: [u8; 32], _: U256) -> Result<()> {
        Ok(())
    }
    async fn update_merkle_root_and_wait_for_confirmation(
        &self,
        _: Address,
        _: [u8; 32],
        _: U256,
    ) -> Result<()> {
        Ok(())
    }
    async fn allocate_yield_to_epoch(&self, _: U256) -> Result<()> {
        Ok(())
    }
    async fn allocate_cumulative_yield_to_epoch(&self, _: u64, _: U256) -> Result<()> {
        Ok(())
    }
    async fn get_current_epoch_id(&self) -> Result<U256> {
        Ok(U256::zero())
    }
    async fn update_exchange_rate(&self) -> Result<()> {
        Ok(())
    }
}

fn test_app() -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(sled::open(dir.path()).unwrap()));
    let state = AppState::new(Arc::new(EmptyQueryClient), store, Arc::new(NoopPublisher));
    (dir, router(state))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_always_ok() {
    let (_dir, app) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readyz_succeeds_when_indexer_and_store_are_reachable() {
    let (_dir, app) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn proof_for_unknown_vault_is_not_found() {
    let (_dir, app) = test_app();
    let vault = "0x0000000000000000000000000000000000000001";
    let user = "0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3";
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/vaults/{vault}/proof/{user}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn malformed_vault_address_is_a_bad_request() {
    let (_dir, app) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/vaults/not-an-address/proof/0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn snapshot_listing_reflects_a_prior_save() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(sled::open(dir.path()).unwrap()));
    let vault = Address::parse("0x0000000000000000000000000000000000000001").unwrap();
    let user = Address::parse("0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3").unwrap();
    store
        .save_snapshot(&Snapshot {
            vault_id: vault.to_lower_hex(),
            epoch_number: "16".to_string(),
            entries: vec![Entry::new(user, num_bigint::BigUint::from(100u32)).unwrap()],
            merkle_root_hex: "0xdead".to_string(),
            block_number: 1,
            timestamp: 0,
            created_at: 0,
        })
        .unwrap();

    let state = AppState::new(Arc::new(EmptyQueryClient), store, Arc::new(NoopPublisher));
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/vaults/{}/snapshots", vault.to_lower_hex()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["epoch_number"], "16");
}

#[tokio::test]
async fn close_on_empty_accrual_set_returns_a_zero_result_without_touching_the_publisher() {
    let (_dir, app) = test_app();
    let vault = "0x0000000000000000000000000000000000000001";
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/vaults/{vault}/close"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["accounts"], 0);
}

#[tokio::test]
async fn metrics_exposes_prometheus_text() {
    let (_dir, app) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("epoch_orchestrator_proof_requests_total"));
}
