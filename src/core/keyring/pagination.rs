//! Page-based account discovery
//!
//! Page `p` covers indexes `[(p-1)*per_page, p*per_page)`. Pages never go
//! below 1 and loading one never changes the stored account list.

use super::events::KeyringEvent;
use super::LedgerBridgeKeyring;
use crate::core::config::MAX_PER_PAGE;
use crate::core::errors::{KeyringError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A discovered account. `balance` is filled in by the caller, if at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub balance: Option<String>,
    pub index: u32,
}

impl LedgerBridgeKeyring {
    pub async fn get_first_page(&mut self) -> Result<Vec<Account>> {
        self.state.page = 0;
        self.load_page(1).await
    }

    pub async fn get_next_page(&mut self) -> Result<Vec<Account>> {
        self.load_page(1).await
    }

    pub async fn get_previous_page(&mut self) -> Result<Vec<Account>> {
        self.load_page(-1).await
    }

    /// Current page, 0 before the first page was loaded.
    pub fn page(&self) -> usize {
        self.state.page
    }

    pub fn per_page(&self) -> usize {
        self.state.per_page
    }

    pub fn set_per_page(&mut self, per_page: usize) -> Result<()> {
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(KeyringError::InvalidInput(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        self.state.per_page = per_page;
        Ok(())
    }

    async fn load_page(&mut self, increment: isize) -> Result<Vec<Account>> {
        let page = (self.state.page as isize).saturating_add(increment).max(1) as usize;
        self.state.page = page;

        let window = |n: usize| {
            u32::try_from(n).map_err(|_| KeyringError::InvalidInput(format!("page {} is out of range", page)))
        };
        let from = window((page - 1).saturating_mul(self.state.per_page))?;
        let to = window(page.saturating_mul(self.state.per_page))?;

        self.unlock(None).await?;

        let mut accounts = Vec::with_capacity(self.state.per_page);
        for index in from..to {
            let address = self.address_from_index(index)?;
            self.registry.register(&address, index)?;
            accounts.push(Account {
                address,
                balance: None,
                index,
            });
        }

        debug!("page {} loaded: indexes {}..{}", page, from, to);
        self.emit(KeyringEvent::PageLoaded { page, from, to });
        Ok(accounts)
    }
}
