//! Prometheus metrics registry for the HTTP API (§4.H).
//!
//! Grounded on the teacher's `src/metrics.rs` (`Registry::new_custom`,
//! `IntCounter`/`Histogram` construction via `opts!`, one `gather()` +
//! `TextEncoder` call per scrape).

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub query_latency_seconds: Histogram,
    pub proof_requests_total: IntCounterVec,
    pub publish_outcomes_total: IntCounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new_custom(Some("epoch_orchestrator".to_string()), None)
            .expect("metrics registry");

        let query_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "query_latency_seconds",
            "Latency of indexed-data-source queries",
        ))
        .expect("query latency histogram");

        let proof_requests_total = IntCounterVec::new(
            Opts::new("proof_requests_total", "Proof requests by outcome"),
            &["outcome"],
        )
        .expect("proof requests counter");

        let publish_outcomes_total = IntCounterVec::new(
            Opts::new("publish_outcomes_total", "On-chain publish attempts by outcome"),
            &["outcome"],
        )
        .expect("publish outcomes counter");

        registry
            .register(Box::new(query_latency_seconds.clone()))
            .expect("registering query latency histogram");
        registry
            .register(Box::new(proof_requests_total.clone()))
            .expect("registering proof requests counter");
        registry
            .register(Box::new(publish_outcomes_total.clone()))
            .expect("registering publish outcomes counter");

        Self {
            registry,
            query_latency_seconds,
            proof_requests_total,
            publish_outcomes_total,
        }
    }

    pub fn record_proof_outcome(&self, outcome: &str) {
        self.proof_requests_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_publish_outcome(&self, outcome: &str) {
        self.publish_outcomes_total.with_label_values(&[outcome]).inc();
    }
}

pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);
