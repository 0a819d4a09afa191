//! Shared application state threaded through every Axum handler (§4.H).
//!
//! Grounded on the teacher's `src/api/vault_routes.rs` `AppState` (a small
//! `Clone` struct of `Arc`-wrapped shared handles passed via `State<...>`).

use std::sync::Arc;

use crate::chain::OnChainPublisher;
use crate::indexer::QueryClient;
use crate::store::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub query: Arc<dyn QueryClient>,
    pub store: Arc<SnapshotStore>,
    pub publisher: Arc<dyn OnChainPublisher>,
}

impl AppState {
    pub fn new(
        query: Arc<dyn QueryClient>,
        store: Arc<SnapshotStore>,
        publisher: Arc<dyn OnChainPublisher>,
    ) -> Self {
        Self {
            query,
            store,
            publisher,
        }
    }
}
