//! Ledger bridge keyring
//!
//! Account management and signing adapter for a Ledger device reached
//! through the bridge. Public keys are derived locally from the extended
//! public key the device reports; every signature is produced by the device
//! and checked here before it is returned.
//!
//! ## Module Structure
//! - `lifecycle` - unlock, HD path changes, (de)serialization, forget
//! - `accounts` - adding, listing and removing accounts
//! - `pagination` - page-based account discovery
//! - `signing` - transaction and personal-message signing
//! - `activity` - explorer lookups for discovered accounts
//! - `events` - broadcast notifications
//! - `state` - keyring state and persisted snapshot

pub mod accounts;
pub mod activity;
pub mod events;
pub mod lifecycle;
pub mod pagination;
pub mod signing;
pub mod state;

pub use events::KeyringEvent;
pub use lifecycle::UnlockOutcome;
pub use pagination::Account;
pub use signing::SignedTransaction;
pub use state::{KeyringSnapshot, KeyringState};

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::blockchain::explorer::{ExplorerClient, TransactionHistory};
use crate::core::bip44::{derive_address, path_for_index, ExtendedPublicKey};
use crate::core::config::KeyringConfig;
use crate::core::errors::Result;
use crate::core::path_registry::PathRegistry;
use crate::hardware::ledger::transport::{BridgeTransport, MessagePort};

pub const KEYRING_TYPE: &str = "Ledger Hardware";

/// Child addresses are derived at `m/{index}` below the unlocked key.
const PATH_BASE: &str = "m";

/// Keyring backed by a Ledger device behind the bridge.
pub struct LedgerBridgeKeyring {
    pub(crate) config: KeyringConfig,
    pub(crate) state: KeyringState,
    /// Present iff the device is unlocked
    pub(crate) hdk: Option<ExtendedPublicKey>,
    /// Session-only address → index cache
    pub(crate) registry: PathRegistry,
    pub(crate) transport: Arc<BridgeTransport>,
    pub(crate) history: Arc<dyn TransactionHistory>,
    pub(crate) events: broadcast::Sender<KeyringEvent>,
}

impl LedgerBridgeKeyring {
    /// Create a keyring whose bridge messages travel over `port`.
    pub fn new(config: KeyringConfig, port: Arc<dyn MessagePort>) -> Self {
        let transport = Arc::new(BridgeTransport::new(
            port,
            &config.bridge_url,
            config.request_timeout(),
        ));
        Self::with_transport(config, transport)
    }

    /// Create a keyring on an existing transport.
    pub fn with_transport(config: KeyringConfig, transport: Arc<BridgeTransport>) -> Self {
        let (events, _) = broadcast::channel(events::EVENT_CAPACITY);
        Self {
            state: KeyringState::from_config(&config),
            registry: PathRegistry::new(config.max_index),
            hdk: None,
            transport,
            history: Arc::new(ExplorerClient::new()),
            events,
            config,
        }
    }

    /// Replace the transaction-history collaborator.
    pub fn with_history(mut self, history: Arc<dyn TransactionHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn keyring_type(&self) -> &'static str {
        KEYRING_TYPE
    }

    pub fn transport(&self) -> &Arc<BridgeTransport> {
        &self.transport
    }

    pub fn state(&self) -> &KeyringState {
        &self.state
    }

    pub fn hd_path(&self) -> &str {
        &self.state.hd_path
    }

    pub fn bridge_url(&self) -> &str {
        &self.state.bridge_url
    }

    /// Addresses currently held in the session path cache.
    pub fn cached_paths(&self) -> usize {
        self.registry.len()
    }

    pub fn address_from_index(&self, index: u32) -> Result<String> {
        derive_address(self.hdk.as_ref(), &format!("{}/{}", PATH_BASE, index))
    }

    /// Full HD path of a known address.
    pub fn path_from_address(&self, address: &str) -> Result<String> {
        let index = self.registry.resolve_index(self.hdk.as_ref(), address)?;
        Ok(path_for_index(&self.state.hd_path, index))
    }
}
