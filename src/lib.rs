//! Off-chain epoch orchestrator: ingests per-account accrual rows from an
//! indexed read model, projects them to earnings, commits them to a
//! keccak-256 Merkle tree byte-exact with the on-chain verifier, persists a
//! versioned snapshot, publishes the root on-chain, and serves proofs.

pub mod api;
pub mod chain;
pub mod cli;
pub mod config;
pub mod domain;
pub mod driver;
pub mod earnings;
pub mod error;
pub mod indexer;
pub mod merkle;
pub mod proof_service;
pub mod store;
