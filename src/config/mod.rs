//! Typed configuration, loaded from a TOML file with environment overrides.
//!
//! Override form: `EPOCH_ORCH__<SECTION>__<KEY>`, e.g.
//! `EPOCH_ORCH__CHAIN__RPC_URL=http://localhost:8545`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub indexer: IndexerConfig,
    pub chain: ChainConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    pub endpoint: String,
    #[serde(default = "default_indexer_timeout", with = "duration_string")]
    pub timeout: Duration,
}

fn default_indexer_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_gas_price")]
    pub gas_price: String,
    pub epoch_manager: String,
    pub debt_subsidizer: String,
    pub lending_manager: Option<String>,
    pub collection_registry: Option<String>,
    pub comptroller: Option<String>,
    /// First-class escape hatch for "mock mode" (see DESIGN.md Open Question ii).
    /// Defaults to true whenever `rpc_url` or `private_key` is absent.
    pub dry_run: Option<bool>,
}

impl ChainConfig {
    pub fn effective_dry_run(&self) -> bool {
        self.dry_run
            .unwrap_or_else(|| self.rpc_url.is_none() || self.private_key.is_none())
    }
}

fn default_gas_limit() -> u64 {
    300_000
}

fn default_gas_price() -> String {
    "1000000000".to_string() // 1 gwei
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output: default_log_output(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_output() -> String {
    "stdout".to_string()
}
fn default_log_format() -> LogFormat {
    LogFormat::Text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_request_timeout", with = "duration_string")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DriverConfig {
    #[serde(default, with = "duration_string::option")]
    pub close_interval: Option<Duration>,
    /// Vaults the background ticker closes on `close_interval`, when set.
    #[serde(default)]
    pub vaults: Vec<String>,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            OrchestratorError::ConfigError(format!("reading {}: {e}", path.display()))
        })?;
        Self::load_from_str(&raw)
    }

    pub fn load_from_str(raw: &str) -> Result<Self> {
        let mut value: toml::Value = toml::from_str(raw)
            .map_err(|e| OrchestratorError::ConfigError(format!("parsing config: {e}")))?;

        apply_env_overrides(&mut value);

        let mut config = Config::deserialize(value)
            .map_err(|e| OrchestratorError::ConfigError(format!("validating config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        if self.indexer.endpoint.is_empty() {
            return Err(OrchestratorError::ConfigError(
                "indexer.endpoint must not be empty".to_string(),
            ));
        }
        parse_address(&self.chain.epoch_manager)?;
        parse_address(&self.chain.debt_subsidizer)?;
        if let Some(pk) = &self.chain.private_key {
            let stripped = pk.strip_prefix("0x").unwrap_or(pk);
            hex::decode(stripped).map_err(|e| {
                OrchestratorError::ConfigError(format!("chain.private_key is not hex: {e}"))
            })?;
        }
        Ok(())
    }
}

fn parse_address(raw: &str) -> Result<()> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(stripped)
        .map_err(|e| OrchestratorError::ConfigError(format!("invalid address {raw}: {e}")))?;
    if bytes.len() != 20 {
        return Err(OrchestratorError::ConfigError(format!(
            "address {raw} must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

/// Applies `EPOCH_ORCH__SECTION__KEY` environment overrides onto a parsed TOML
/// value tree, in place, before it is deserialized into `Config`.
fn apply_env_overrides(root: &mut toml::Value) {
    const PREFIX: &str = "EPOCH_ORCH__";
    for (key, val) in std::env::vars() {
        let Some(rest) = key.strip_prefix(PREFIX) else {
            continue;
        };
        let path: Vec<String> = rest.split("__").map(|s| s.to_lowercase()).collect();
        if path.is_empty() {
            continue;
        }
        set_path(root, &path, val);
    }
}

fn set_path(root: &mut toml::Value, path: &[String], raw_value: String) {
    let table = match root {
        toml::Value::Table(t) => t,
        _ => return,
    };
    if path.len() == 1 {
        let parsed = parse_env_scalar(&raw_value);
        table.insert(path[0].clone(), parsed);
        return;
    }
    let entry = table
        .entry(path[0].clone())
        .or_insert_with(|| toml::Value::Table(Default::default()));
    set_path(entry, &path[1..], raw_value);
}

fn parse_env_scalar(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    toml::Value::String(raw.to_string())
}

/// `serde_with`-style helper for `Duration <-> "30s"/"500ms"` without pulling
/// in the `serde_with` crate: a small local module used via `#[serde(with =
/// "duration_string")]`, mirroring this codebase's preference for a hand-rolled
/// helper over an extra dependency when the need is this narrow.
mod duration_string {
    use super::Duration;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> std::result::Result<Duration, String> {
        let raw = raw.trim();
        if let Some(secs) = raw.strip_suffix("ms") {
            return secs
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string());
        }
        if let Some(secs) = raw.strip_suffix('s') {
            return secs
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string());
        }
        if let Some(mins) = raw.strip_suffix('m') {
            return mins
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|e| e.to_string());
        }
        raw.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| e.to_string())
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|s| parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        r#"
        [indexer]
        endpoint = "http://localhost:8000/graphql"

        [chain]
        epoch_manager = "0x0000000000000000000000000000000000000001"
        debt_subsidizer = "0x0000000000000000000000000000000000000002"

        [store]
        path = "/tmp/orchestrator"
        "#
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let cfg = Config::load_from_str(sample()).expect("config should parse");
        assert_eq!(cfg.indexer.timeout, Duration::from_secs(30));
        assert_eq!(cfg.chain.gas_limit, 300_000);
        assert!(cfg.chain.effective_dry_run());
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn rejects_malformed_address() {
        let bad = sample().replace(
            "0x0000000000000000000000000000000000000001",
            "not-an-address",
        );
        assert!(Config::load_from_str(&bad).is_err());
    }

    #[test]
    fn env_override_reaches_nested_field() {
        std::env::set_var("EPOCH_ORCH__CHAIN__GAS_LIMIT", "500000");
        let cfg = Config::load_from_str(sample()).expect("config should parse");
        std::env::remove_var("EPOCH_ORCH__CHAIN__GAS_LIMIT");
        assert_eq!(cfg.chain.gas_limit, 500_000);
    }
}
