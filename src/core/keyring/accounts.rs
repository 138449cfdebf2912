use super::events::KeyringEvent;
use super::LedgerBridgeKeyring;
use crate::core::address::same_address;
use crate::core::errors::{KeyringError, Result};
use tracing::info;

impl LedgerBridgeKeyring {
    /// Replace the account list with `n` accounts starting at the unlock offset.
    pub async fn add_accounts(&mut self, n: u32) -> Result<Vec<String>> {
        self.unlock(None).await?;

        let from = self.state.unlocked_account;
        let to = from.checked_add(n).ok_or_else(|| {
            KeyringError::InvalidInput(format!("account range {}+{} overflows", from, n))
        })?;

        let mut accounts = Vec::with_capacity(n as usize);
        let mut indexes = std::collections::BTreeMap::new();
        for index in from..to {
            let address = self.address_from_index(index)?;
            indexes.insert(address.clone(), index);
            accounts.push(address);
        }
        self.state.accounts = accounts;
        self.state.account_indexes = indexes;
        self.state.page = 0;

        info!("added {} accounts from index {}", n, from);
        self.emit(KeyringEvent::AccountsAdded { accounts: self.state.accounts.clone() });
        Ok(self.state.accounts.clone())
    }

    pub fn get_accounts(&self) -> Vec<String> {
        self.state.accounts.clone()
    }

    pub fn remove_account(&mut self, address: &str) -> Result<()> {
        let stored = self
            .state
            .accounts
            .iter()
            .find(|a| same_address(a, address))
            .cloned()
            .ok_or_else(|| KeyringError::NotFound(address.to_string()))?;

        self.state.accounts.retain(|a| a != &stored);
        self.state.account_indexes.remove(&stored);

        info!("removed account {}", stored);
        self.emit(KeyringEvent::AccountRemoved { address: stored });
        Ok(())
    }
}
