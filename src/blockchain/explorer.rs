//! Explorer API client
//!
//! Answers whether an address has on-chain history, used by wallet managers
//! to decide how far account discovery should go.

use crate::core::errors::{KeyringError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Transaction-history lookup keyed by explorer base URL.
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    async fn has_transactions(&self, api_url: &str, address: &str) -> Result<bool>;
}

/// Explorer API response
#[derive(Debug, Deserialize)]
struct TxListResponse {
    status: String,
    #[serde(default)]
    result: Value,
}

/// Etherscan-compatible explorer client
#[derive(Debug, Clone, Default)]
pub struct ExplorerClient {
    client: reqwest::Client,
}

impl ExplorerClient {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransactionHistory for ExplorerClient {
    async fn has_transactions(&self, api_url: &str, address: &str) -> Result<bool> {
        let url = format!("{}/api", api_url.trim_end_matches('/'));

        let response: TxListResponse = self
            .client
            .get(&url)
            .query(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("tag", "latest"),
                ("page", "1"),
                ("offset", "1"),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| KeyringError::Network(format!("explorer returned an error: {}", e)))?
            .json()
            .await?;

        // "0" means no records (or an explorer-side error); `result` is then a message string
        Ok(response.status != "0"
            && response.result.as_array().map(|txs| !txs.is_empty()).unwrap_or(false))
    }
}
