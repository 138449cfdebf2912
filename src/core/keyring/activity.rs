use super::LedgerBridgeKeyring;
use crate::core::address::to_checksum_address;
use crate::core::errors::{KeyringError, Result};
use tracing::debug;

impl LedgerBridgeKeyring {
    pub fn network(&self) -> &str {
        &self.state.network
    }

    /// Select the explorer network; unknown names resolve to the default network.
    pub fn set_network(&mut self, network: &str) {
        self.state.network = network.to_string();
    }

    pub fn api_url(&self) -> Result<String> {
        self.config
            .api_url(&self.state.network)
            .map(str::to_string)
            .ok_or_else(|| {
                KeyringError::Config(format!("no explorer configured for network '{}'", self.state.network))
            })
    }

    /// Whether `address` has at least one transaction on the active network.
    pub async fn has_previous_transactions(&self, address: &str) -> Result<bool> {
        let address = to_checksum_address(address)?;
        let api_url = self.api_url()?;
        debug!("checking history of {} via {}", address, api_url);
        self.history.has_transactions(&api_url, &address).await
    }
}
