//! Configuration module for the candy machine mint client
//!
//! Configuration is loaded from a TOML file, then overridden from the
//! environment (a `.env` file is honored through `dotenvy`).

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CANDY_MACHINE_ID: &str = "CANDY_MACHINE_ID";
pub const ENV_RPC_HOST: &str = "SOLANA_RPC_HOST";
pub const ENV_WS_HOST: &str = "SOLANA_WS_HOST";
pub const ENV_KEYPAIR: &str = "CANDY_MINT_KEYPAIR";
pub const ENV_TX_TIMEOUT_MS: &str = "CANDY_MINT_TX_TIMEOUT_MS";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub sale: SaleConfig,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// HTTP JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Websocket endpoint; derived from `url` when absent
    #[serde(default)]
    pub ws_url: Option<String>,

    /// `processed`, `confirmed` or `finalized`
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Candy machine account address (base58)
    #[serde(default)]
    pub candy_machine_id: Option<String>,

    /// Advertised start date (unix seconds), printed while no sale state is loaded
    #[serde(default)]
    pub start_date: Option<i64>,

    /// Compute unit limit for the mint transaction (0 = cluster default)
    #[serde(default)]
    pub compute_unit_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Budget for a submitted transaction to reach a terminal status
    #[serde(default = "default_tx_timeout_ms")]
    pub tx_timeout_ms: u64,

    /// Status polling interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Also listen for websocket status notifications
    #[serde(default = "default_true")]
    pub prefer_subscription: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Collect Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.devnet.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_tx_timeout_ms() -> u64 { 30_000 }
fn default_poll_interval_ms() -> u64 { 2_000 }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            ws_url: None,
            commitment: default_commitment(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            tx_timeout_ms: default_tx_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            prefer_subscription: default_true(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            json_logs: false,
        }
    }
}

impl RpcConfig {
    pub fn commitment_config(&self) -> anyhow::Result<CommitmentConfig> {
        CommitmentConfig::from_str(&self.commitment)
            .map_err(|_| anyhow::anyhow!("Unknown commitment level: {}", self.commitment))
    }

    /// Websocket url, `http(s)://` swapped for `ws(s)://` when not configured
    pub fn websocket_url(&self) -> String {
        match &self.ws_url {
            Some(url) => url.clone(),
            None => {
                if let Some(rest) = self.url.strip_prefix("https://") {
                    format!("wss://{rest}")
                } else if let Some(rest) = self.url.strip_prefix("http://") {
                    format!("ws://{rest}")
                } else {
                    self.url.clone()
                }
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SaleConfig {
    pub fn start_datetime(&self) -> Option<DateTime<Utc>> {
        self.start_date
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
    }
}

impl ConfirmationConfig {
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(ENV_CANDY_MACHINE_ID) {
            self.sale.candy_machine_id = Some(id);
        }
        if let Some(url) = lookup(ENV_RPC_HOST) {
            self.rpc.url = url;
        }
        if let Some(url) = lookup(ENV_WS_HOST) {
            self.rpc.ws_url = Some(url);
        }
        if let Some(path) = lookup(ENV_KEYPAIR) {
            self.wallet.keypair_path = path;
        }
        if let Some(timeout) = lookup(ENV_TX_TIMEOUT_MS) {
            self.confirmation.tx_timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TX_TIMEOUT_MS} is not a number: {timeout}"))?;
        }
        Ok(())
    }

    /// Candy machine address, if configured
    pub fn candy_machine(&self) -> anyhow::Result<Option<Pubkey>> {
        self.sale
            .candy_machine_id
            .as_deref()
            .map(|id| {
                Pubkey::from_str(id.trim())
                    .with_context(|| format!("Invalid candy machine id: {id}"))
            })
            .transpose()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc.url.trim().is_empty() {
            anyhow::bail!("rpc.url must not be empty");
        }
        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be greater than zero");
        }
        self.rpc.commitment_config()?;
        if self.confirmation.tx_timeout_ms == 0 {
            anyhow::bail!("confirmation.tx_timeout_ms must be greater than zero");
        }
        if self.confirmation.poll_interval_ms == 0 {
            anyhow::bail!("confirmation.poll_interval_ms must be greater than zero");
        }
        if self.confirmation.poll_interval_ms >= self.confirmation.tx_timeout_ms {
            anyhow::bail!(
                "confirmation.poll_interval_ms ({}) must be below tx_timeout_ms ({})",
                self.confirmation.poll_interval_ms,
                self.confirmation.tx_timeout_ms
            );
        }
        self.candy_machine()?;
        Ok(())
    }
}
