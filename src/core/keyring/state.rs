//! Keyring state and its persisted snapshot

use crate::core::address::to_checksum_address;
use crate::core::config::KeyringConfig;
use crate::core::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mutable keyring state. Addresses are stored checksum-cased.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyringState {
    pub hd_path: String,
    pub bridge_url: String,
    pub accounts: Vec<String>,
    pub account_indexes: BTreeMap<String, u32>,
    pub unlocked_account: u32,
    pub page: usize,
    pub per_page: usize,
    pub network: String,
}

impl KeyringState {
    pub fn from_config(config: &KeyringConfig) -> Self {
        Self {
            hd_path: config.hd_path.clone(),
            bridge_url: config.bridge_url.clone(),
            accounts: Vec::new(),
            account_indexes: BTreeMap::new(),
            unlocked_account: 0,
            page: 0,
            per_page: config.per_page,
            network: config.network.clone(),
        }
    }
}

/// Persisted configuration: `{ hdPath, accounts, accountIndexes, bridgeUrl }`.
///
/// Missing fields fall back to the keyring defaults on `deserialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd_path: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub account_indexes: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,
}

impl KeyringSnapshot {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Accounts checksum-cased with duplicates dropped (first occurrence kept).
    pub(crate) fn normalized_accounts(&self) -> Result<Vec<String>> {
        let mut accounts: Vec<String> = Vec::with_capacity(self.accounts.len());
        for account in &self.accounts {
            let checksummed = to_checksum_address(account)?;
            if !accounts.contains(&checksummed) {
                accounts.push(checksummed);
            }
        }
        Ok(accounts)
    }

    pub(crate) fn normalized_indexes(&self) -> Result<BTreeMap<String, u32>> {
        self.account_indexes
            .iter()
            .map(|(address, index)| Ok((to_checksum_address(address)?, *index)))
            .collect()
    }
}
