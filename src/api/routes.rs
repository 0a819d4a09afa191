//! Axum router fronting the Proof Service, Distribution Driver, Snapshot
//! Store range listing and health/metrics (Component H, §4.H).
//!
//! Grounded on the teacher's `src/api/vault_routes.rs` (`Router::new()`
//! route composition, `State<AppState>` handlers returning
//! `Json<serde_json::Value>` or `impl IntoResponse`, `tracing` on admin-style
//! mutating routes) and `src/main.rs`'s `/metrics` exposition.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::domain::Address;
use crate::driver::{close_epoch, DistributionResult};
use crate::error::Result;
use crate::indexer::health_check;
use crate::proof_service::{generate_historical_merkle_proof, generate_user_merkle_proof, MerkleProof};

use super::metrics::METRICS;
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/vaults/:vault/proof/:user", get(current_proof))
        .route("/vaults/:vault/epochs/:epoch/proof/:user", get(historical_proof))
        .route("/vaults/:vault/snapshots", get(list_snapshots))
        .route("/vaults/:vault/close", post(close_vault))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let indexer_ok = health_check(state.query.as_ref()).await.unwrap_or(false);
    let store_ok = state.store.list_snapshots("0x0", 1).is_ok();

    if indexer_ok && store_ok {
        (axum::http::StatusCode::OK, Json(serde_json::json!({ "ready": true })))
    } else {
        tracing::warn!(indexer_ok, store_ok, "readiness check failed");
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ready": false, "indexer_ok": indexer_ok, "store_ok": store_ok })),
        )
    }
}

async fn metrics() -> impl IntoResponse {
    let families = METRICS.registry.gather();
    let mut buf = Vec::with_capacity(4 * 1024);
    let encoder = TextEncoder::new();
    if encoder.encode(&families, &mut buf).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "metrics encode error".to_string(),
        );
    }
    let body = String::from_utf8(buf).unwrap_or_else(|_| "# encoding error\n".to_string());
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

fn parse_path_address(vault: &str) -> Result<Address> {
    Address::parse(vault)
}

async fn current_proof(
    State(state): State<AppState>,
    Path((vault, user)): Path<(String, String)>,
) -> Result<Json<MerkleProof>> {
    let vault = parse_path_address(&vault)?;
    let user = parse_path_address(&user)?;
    let started = std::time::Instant::now();
    let result = generate_user_merkle_proof(state.query.as_ref(), &state.store, vault, user).await;
    METRICS.query_latency_seconds.observe(started.elapsed().as_secs_f64());
    METRICS.record_proof_outcome(if result.is_ok() { "hit" } else { "error" });
    Ok(Json(result?))
}

async fn historical_proof(
    State(state): State<AppState>,
    Path((vault, epoch, user)): Path<(String, String, String)>,
) -> Result<Json<MerkleProof>> {
    let vault = parse_path_address(&vault)?;
    let user = parse_path_address(&user)?;
    let started = std::time::Instant::now();
    let result =
        generate_historical_merkle_proof(state.query.as_ref(), &state.store, vault, user, &epoch).await;
    METRICS.query_latency_seconds.observe(started.elapsed().as_secs_f64());
    METRICS.record_proof_outcome(if result.is_ok() { "hit" } else { "error" });
    Ok(Json(result?))
}

#[derive(Debug, Deserialize)]
struct ListSnapshotsParams {
    #[serde(default)]
    limit: Option<usize>,
}

async fn list_snapshots(
    State(state): State<AppState>,
    Path(vault): Path<String>,
    Query(params): Query<ListSnapshotsParams>,
) -> Result<Json<Vec<crate::store::Snapshot>>> {
    let vault = parse_path_address(&vault)?;
    let snapshots = state
        .store
        .list_snapshots(&vault.to_lower_hex(), params.limit.unwrap_or(0))?;
    Ok(Json(snapshots))
}

#[derive(Debug, Deserialize)]
struct CloseParams {
    epoch: Option<u64>,
}

#[derive(Debug, Serialize)]
struct CloseResponse {
    #[serde(flatten)]
    result: DistributionResult,
}

async fn close_vault(
    State(state): State<AppState>,
    Path(vault): Path<String>,
    Query(params): Query<CloseParams>,
) -> Result<Json<CloseResponse>> {
    let vault = parse_path_address(&vault)?;
    tracing::info!(vault = %vault, epoch = ?params.epoch, "admin-triggered epoch close");

    let outcome = close_epoch(
        state.query.as_ref(),
        &state.store,
        state.publisher.as_ref(),
        vault,
        params.epoch,
    )
    .await;

    METRICS.record_publish_outcome(if outcome.is_ok() { "success" } else { "failure" });
    Ok(Json(CloseResponse { result: outcome? }))
}
