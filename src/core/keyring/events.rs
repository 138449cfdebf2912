//! Keyring notifications
//!
//! Delivered over a `tokio::sync::broadcast` channel; subscribers that fall
//! behind lose the oldest events rather than blocking the keyring.

use super::LedgerBridgeKeyring;
use tokio::sync::broadcast;

pub(crate) const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyringEvent {
    Unlocked { address: String },
    /// The extended key was dropped because the HD path changed.
    Locked,
    AccountsAdded { accounts: Vec<String> },
    AccountRemoved { address: String },
    PageLoaded { page: usize, from: u32, to: u32 },
    TransactionSigned { address: String },
    MessageSigned { address: String },
    DeviceForgotten,
}

impl LedgerBridgeKeyring {
    pub fn subscribe(&self) -> broadcast::Receiver<KeyringEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: KeyringEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
