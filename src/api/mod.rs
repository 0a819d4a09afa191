//! HTTP API (Component H, §4.H): Axum router fronting the Proof Service,
//! Distribution Driver, Snapshot Store and health/metrics. Ambient to the
//! core (§1), but specified and implemented the same as any other part of
//! the service.

mod metrics;
mod routes;
mod state;

pub use routes::router;
pub use state::AppState;
