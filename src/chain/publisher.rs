//! On-Chain Publisher (Component E, §4.E). Signs and submits legacy
//! EIP-155 transactions against the configured `EpochManager` and
//! `DebtSubsidizer` contracts over a plain JSON-RPC endpoint.
//!
//! Grounded on the teacher's `src/external_rpc.rs` (`RpcClient` shape: a
//! `reqwest::Client`, a primary URL, JSON-RPC envelope construction) and
//! `src/utxo_signing.rs` (secp256k1 signing idiom), generalized from
//! UTXO-chain signing to an EVM legacy transaction.

use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::U256;
use secp256k1::SecretKey;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::config::ChainConfig;
use crate::domain::Address;
use crate::error::{OrchestratorError, Result};

use super::abi;
use super::tx::LegacyTransaction;

#[async_trait]
pub trait OnChainPublisher: Send + Sync {
    async fn start_epoch(&self) -> Result<()>;
    async fn end_epoch_with_subsidies(
        &self,
        epoch_number: u64,
        vault: Address,
        root: [u8; 32],
        total: U256,
    ) -> Result<()>;
    async fn force_end_epoch_with_zero_yield(&self, epoch_number: u64, vault: Address) -> Result<()>;
    async fn update_merkle_root(&self, vault: Address, root: [u8; 32], total: U256) -> Result<()>;
    async fn update_merkle_root_and_wait_for_confirmation(
        &self,
        vault: Address,
        root: [u8; 32],
        total: U256,
    ) -> Result<()>;
    async fn allocate_yield_to_epoch(&self, amount: U256) -> Result<()>;
    async fn allocate_cumulative_yield_to_epoch(
        &self,
        epoch_number: u64,
        cumulative_amount: U256,
    ) -> Result<()>;
    async fn get_current_epoch_id(&self) -> Result<U256>;
    async fn update_exchange_rate(&self) -> Result<()>;
}

/// The deadline an "and-wait" submission polls `eth_getTransactionReceipt`
/// against before surfacing `OnChainTimeoutError`.
const RECEIPT_DEADLINE: Duration = Duration::from_secs(120);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct RpcPublisher {
    http: reqwest::Client,
    rpc_url: Option<String>,
    secret_key: Option<SecretKey>,
    from_address: Option<Address>,
    epoch_manager: Address,
    debt_subsidizer: Address,
    gas_limit: U256,
    gas_price: U256,
    dry_run: bool,
}

impl RpcPublisher {
    pub fn from_config(cfg: &ChainConfig) -> Result<Self> {
        let dry_run = cfg.effective_dry_run();

        let secret_key = cfg
            .private_key
            .as_deref()
            .map(parse_private_key)
            .transpose()?;
        let from_address = secret_key.as_ref().map(derive_address);

        let gas_price = U256::from_dec_str(&cfg.gas_price).map_err(|e| {
            OrchestratorError::ConfigError(format!("chain.gas_price is not a decimal integer: {e}"))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OrchestratorError::ConfigError(format!("building RPC client: {e}")))?;

        Ok(Self {
            http,
            rpc_url: cfg.rpc_url.clone(),
            secret_key,
            from_address,
            epoch_manager: parse_address(&cfg.epoch_manager)?,
            debt_subsidizer: parse_address(&cfg.debt_subsidizer)?,
            gas_limit: U256::from(cfg.gas_limit),
            gas_price,
            dry_run,
        })
    }

    async fn call_rpc(&self, method: &str, params: Value) -> Result<Value> {
        let url = self
            .rpc_url
            .as_deref()
            .ok_or_else(|| OrchestratorError::ConfigError("chain.rpc_url is not configured".to_string()))?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::QueryTransportError(format!("{method}: {e}")))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::QueryTransportError(format!(
                "{method} returned HTTP {}",
                response.status()
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::QueryDecodeError(format!("{method}: {e}")))?;

        if let Some(error) = envelope.get("error") {
            return Err(OrchestratorError::OnChainRevertError(format!(
                "{method}: {error}"
            )));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| OrchestratorError::QueryDecodeError(format!("{method}: missing `result`")))
    }

    async fn chain_id(&self) -> Result<u64> {
        let raw = self.call_rpc("eth_chainId", json!([])).await?;
        hex_value_to_u64(&raw, "eth_chainId")
    }

    async fn nonce(&self, from: Address) -> Result<U256> {
        let raw = self
            .call_rpc("eth_getTransactionCount", json!([from.to_lower_hex(), "pending"]))
            .await?;
        hex_value_to_u256(&raw, "eth_getTransactionCount")
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let raw = self
            .call_rpc(
                "eth_call",
                json!([
                    { "to": to.to_lower_hex(), "data": format!("0x{}", hex::encode(&data)) },
                    "latest"
                ]),
            )
            .await?;
        let hex_str = raw
            .as_str()
            .ok_or_else(|| OrchestratorError::QueryDecodeError("eth_call: result is not a string".to_string()))?;
        hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|e| OrchestratorError::QueryDecodeError(format!("eth_call: decoding result: {e}")))
    }

    /// Builds, signs and submits a transaction to `to`, returning the raw
    /// transaction hash. In dry-run mode, logs and returns a synthetic
    /// success without touching the network (§4.E "Mock mode").
    async fn send(&self, to: Address, data: Vec<u8>) -> Result<String> {
        if self.dry_run {
            tracing::info!(
                to = %to,
                data_len = data.len(),
                "dry-run: skipping on-chain submission"
            );
            return Ok("0x0".repeat(1).to_string());
        }

        let secret_key = self
            .secret_key
            .ok_or_else(|| OrchestratorError::ConfigError("chain.private_key is not configured".to_string()))?;
        let from = self
            .from_address
            .ok_or_else(|| OrchestratorError::ConfigError("chain.private_key is not configured".to_string()))?;

        let chain_id = self.chain_id().await?;
        let nonce = self.nonce(from).await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to,
            value: U256::zero(),
            data,
        };
        let raw = tx.sign(&secret_key, chain_id)?;

        let result = self
            .call_rpc(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(&raw))]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| OrchestratorError::QueryDecodeError("eth_sendRawTransaction: result is not a string".to_string()))
    }

    /// Submits, then polls `eth_getTransactionReceipt` until confirmation,
    /// timeout, or revert (§4.E, §7).
    async fn send_and_wait(&self, to: Address, data: Vec<u8>) -> Result<()> {
        let tx_hash = self.send(to, data).await?;
        if self.dry_run {
            return Ok(());
        }

        let deadline = Instant::now() + RECEIPT_DEADLINE;
        loop {
            let receipt = self
                .call_rpc("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if !receipt.is_null() {
                let status = receipt
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("0x0");
                return if status == "0x1" {
                    Ok(())
                } else {
                    Err(OrchestratorError::OnChainRevertError(format!(
                        "transaction {tx_hash} reverted"
                    )))
                };
            }

            if Instant::now() >= deadline {
                return Err(OrchestratorError::OnChainTimeoutError(format!(
                    "transaction {tx_hash} not mined within {}s",
                    RECEIPT_DEADLINE.as_secs()
                )));
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl OnChainPublisher for RpcPublisher {
    async fn start_epoch(&self) -> Result<()> {
        let data = abi::start_epoch()?;
        self.send(self.epoch_manager, data).await.map(|_| ())
    }

    async fn end_epoch_with_subsidies(
        &self,
        epoch_number: u64,
        vault: Address,
        root: [u8; 32],
        total: U256,
    ) -> Result<()> {
        let data = abi::end_epoch_with_subsidies(U256::from(epoch_number), vault, root, total)?;
        self.send(self.epoch_manager, data).await.map(|_| ())
    }

    async fn force_end_epoch_with_zero_yield(&self, epoch_number: u64, vault: Address) -> Result<()> {
        let data = abi::force_end_epoch_with_zero_yield(U256::from(epoch_number), vault)?;
        self.send(self.epoch_manager, data).await.map(|_| ())
    }

    async fn update_merkle_root(&self, vault: Address, root: [u8; 32], total: U256) -> Result<()> {
        let data = abi::update_merkle_root(vault, root, total)?;
        self.send(self.debt_subsidizer, data).await.map(|_| ())
    }

    async fn update_merkle_root_and_wait_for_confirmation(
        &self,
        vault: Address,
        root: [u8; 32],
        total: U256,
    ) -> Result<()> {
        let data = abi::update_merkle_root(vault, root, total)?;
        self.send_and_wait(self.debt_subsidizer, data).await
    }

    async fn allocate_yield_to_epoch(&self, amount: U256) -> Result<()> {
        let data = abi::allocate_yield_to_epoch(amount)?;
        self.send(self.epoch_manager, data).await.map(|_| ())
    }

    async fn allocate_cumulative_yield_to_epoch(
        &self,
        epoch_number: u64,
        cumulative_amount: U256,
    ) -> Result<()> {
        let data =
            abi::allocate_cumulative_yield_to_epoch(U256::from(epoch_number), cumulative_amount)?;
        self.send(self.epoch_manager, data).await.map(|_| ())
    }

    async fn get_current_epoch_id(&self) -> Result<U256> {
        if self.dry_run {
            return Ok(U256::zero());
        }
        let data = abi::get_current_epoch_id()?;
        let raw = self.eth_call(self.epoch_manager, data).await?;
        abi::decode_current_epoch_id(&raw)
    }

    async fn update_exchange_rate(&self) -> Result<()> {
        let data = abi::update_exchange_rate()?;
        self.send(self.epoch_manager, data).await.map(|_| ())
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    Address::parse(raw)
}

fn parse_private_key(raw: &str) -> Result<SecretKey> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(stripped)
        .map_err(|e| OrchestratorError::ConfigError(format!("chain.private_key is not hex: {e}")))?;
    SecretKey::from_slice(&bytes)
        .map_err(|e| OrchestratorError::ConfigError(format!("chain.private_key is not a valid secp256k1 key: {e}")))
}

fn derive_address(secret_key: &SecretKey) -> Address {
    use secp256k1::{PublicKey, Secp256k1};
    use sha3::{Digest, Keccak256};

    let secp = Secp256k1::new();
    let public_key = PublicKey::from_secret_key(&secp, secret_key);
    let uncompressed = public_key.serialize_uncompressed();
    // Skip the leading 0x04 prefix; address is the last 20 bytes of keccak256(pubkey).
    let hash = Keccak256::digest(&uncompressed[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..32]);
    Address(bytes)
}

fn hex_value_to_u64(value: &Value, context: &str) -> Result<u64> {
    let raw = value
        .as_str()
        .ok_or_else(|| OrchestratorError::QueryDecodeError(format!("{context}: result is not a string")))?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|e| OrchestratorError::QueryDecodeError(format!("{context}: {e}")))
}

fn hex_value_to_u256(value: &Value, context: &str) -> Result<U256> {
    let raw = value
        .as_str()
        .ok_or_else(|| OrchestratorError::QueryDecodeError(format!("{context}: result is not a string")))?;
    U256::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|e| OrchestratorError::QueryDecodeError(format!("{context}: {e}")))
}
