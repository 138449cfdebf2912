use crate::core::errors::{KeyringError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HD_PATH: &str = "m/44'/108'/0'/0";
pub const DEFAULT_BRIDGE_URL: &str = "https://ubiq.github.io/ubq-ledger-bridge-keyring";
/// Largest page the pager derives in one go.
pub const MAX_PER_PAGE: usize = 100;
pub const DEFAULT_NETWORK: &str = "mainnet";

/// Explorer endpoint for one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub api_url: String,
}

/// Keyring configuration
///
/// Every field has a default so a partial TOML document is enough:
///
/// ```toml
/// bridge_url = "https://example.org/bridge/index.html"
/// per_page = 10
///
/// [networks.testnet]
/// name = "Testnet"
/// api_url = "https://explorer.testnet.example"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyringConfig {
    /// HD path template of the account-level extended key
    #[serde(default = "KeyringConfig::default_hd_path")]
    pub hd_path: String,

    /// Bridge page URL; its origin is derived by dropping the last path segment
    #[serde(default = "KeyringConfig::default_bridge_url")]
    pub bridge_url: String,

    /// Accounts shown per discovery page
    #[serde(default = "KeyringConfig::default_per_page")]
    pub per_page: usize,

    /// Upper bound of the fallback re-derivation scan. Each miss costs one
    /// public derivation, so resolving an unknown address is O(max_index).
    #[serde(default = "KeyringConfig::default_max_index")]
    pub max_index: u32,

    /// Deadline for a single bridge request (seconds)
    #[serde(default = "KeyringConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Active network name
    #[serde(default = "KeyringConfig::default_network")]
    pub network: String,

    /// Network used when `network` is absent from the table
    #[serde(default = "KeyringConfig::default_network")]
    pub default_network: String,

    #[serde(default = "KeyringConfig::default_networks")]
    pub networks: HashMap<String, NetworkConfig>,
}

impl KeyringConfig {
    fn default_hd_path() -> String { DEFAULT_HD_PATH.to_string() }
    fn default_bridge_url() -> String { DEFAULT_BRIDGE_URL.to_string() }
    fn default_per_page() -> usize { 5 }
    fn default_max_index() -> u32 { 1000 }
    fn default_request_timeout_secs() -> u64 { 120 }
    fn default_network() -> String { DEFAULT_NETWORK.to_string() }

    fn default_networks() -> HashMap<String, NetworkConfig> {
        let mut networks = HashMap::with_capacity(1);
        networks.insert(
            DEFAULT_NETWORK.to_string(),
            NetworkConfig {
                name: "Ubiq Mainnet".to_string(),
                api_url: "https://rpc.octano.dev".to_string(),
            },
        );
        networks
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: KeyringConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            KeyringError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Override selected fields from `LEDGER_BRIDGE_URL`, `LEDGER_HD_PATH` and
    /// `LEDGER_BRIDGE_TIMEOUT_SECS`.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("LEDGER_BRIDGE_URL") {
            self.bridge_url = url;
        }
        if let Ok(path) = std::env::var("LEDGER_HD_PATH") {
            self.hd_path = path;
        }
        if let Ok(secs) = std::env::var("LEDGER_BRIDGE_TIMEOUT_SECS") {
            self.request_timeout_secs = secs.trim().parse().map_err(|_| {
                KeyringError::Config(format!("LEDGER_BRIDGE_TIMEOUT_SECS is not a number: {}", secs))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(KeyringError::Config(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        if self.max_index == 0 {
            return Err(KeyringError::Config("max_index must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(KeyringError::Config("request_timeout_secs must be positive".to_string()));
        }
        if !self.hd_path.starts_with("m/") {
            return Err(KeyringError::Config(format!("hd_path must start with m/: {}", self.hd_path)));
        }
        if !self.networks.contains_key(&self.default_network) {
            return Err(KeyringError::Config(format!(
                "default network '{}' has no entry in the network table",
                self.default_network
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Explorer URL for `network`, falling back to the default network.
    pub fn api_url(&self, network: &str) -> Option<&str> {
        self.networks
            .get(network)
            .or_else(|| self.networks.get(&self.default_network))
            .map(|n| n.api_url.as_str())
    }
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            hd_path: Self::default_hd_path(),
            bridge_url: Self::default_bridge_url(),
            per_page: Self::default_per_page(),
            max_index: Self::default_max_index(),
            request_timeout_secs: Self::default_request_timeout_secs(),
            network: Self::default_network(),
            default_network: Self::default_network(),
            networks: Self::default_networks(),
        }
    }
}
