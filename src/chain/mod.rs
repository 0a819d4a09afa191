//! On-Chain Publisher (Component E, §4.E/§6 "On-chain interface").

mod abi;
mod publisher;
mod tx;

pub use publisher::{OnChainPublisher, RpcPublisher};
