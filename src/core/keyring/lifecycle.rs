//! Unlock state machine, HD path changes and snapshot (de)serialization
//!
//! Locked ⇄ Unlocked: a successful `ledger-unlock` reply installs the
//! extended public key; a different HD path or `forget_device` drops it.

use super::events::KeyringEvent;
use super::state::KeyringSnapshot;
use super::LedgerBridgeKeyring;
use crate::core::address::to_checksum_address;
use crate::core::bip44::{to_device_path, ExtendedPublicKey, HdPath};
use crate::core::errors::Result;
use crate::hardware::ledger::messages::{UnlockParams, UnlockPayload, ACTION_UNLOCK};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Already unlocked and no explicit path was requested; no bridge traffic.
    AlreadyUnlocked,
    Unlocked { address: String },
}

impl LedgerBridgeKeyring {
    pub fn serialize(&self) -> KeyringSnapshot {
        KeyringSnapshot {
            hd_path: Some(self.state.hd_path.clone()),
            accounts: self.state.accounts.clone(),
            account_indexes: self.state.account_indexes.clone(),
            bridge_url: Some(self.state.bridge_url.clone()),
        }
    }

    /// Load a snapshot. Absent fields take the configured defaults.
    pub fn deserialize(&mut self, snapshot: KeyringSnapshot) -> Result<()> {
        let accounts = snapshot.normalized_accounts()?;
        let account_indexes = snapshot.normalized_indexes()?;
        let hd_path = snapshot.hd_path.unwrap_or_else(|| self.config.hd_path.clone());
        HdPath::parse(&hd_path)?;

        if self.state.hd_path != hd_path {
            self.lock(&hd_path);
        }
        self.state.hd_path = hd_path;
        self.state.bridge_url = snapshot.bridge_url.unwrap_or_else(|| self.config.bridge_url.clone());
        self.state.accounts = accounts;
        self.state.account_indexes = account_indexes;
        self.transport.set_bridge_url(&self.state.bridge_url);

        debug!(
            "keyring loaded: {} accounts, hd path {}",
            self.state.accounts.len(),
            self.state.hd_path
        );
        Ok(())
    }

    pub fn is_unlocked(&self) -> bool {
        self.hdk.is_some()
    }

    /// First index used by `add_accounts`.
    pub fn set_account_to_unlock(&mut self, index: u32) {
        self.state.unlocked_account = index;
    }

    /// Switch HD path; a different path drops the extended key and the path cache.
    pub fn set_hd_path(&mut self, hd_path: &str) -> Result<()> {
        HdPath::parse(hd_path)?;
        if self.state.hd_path != hd_path {
            self.lock(hd_path);
        }
        self.state.hd_path = hd_path.to_string();
        Ok(())
    }

    fn lock(&mut self, new_path: &str) {
        info!("hd path changed {} -> {}, locking", self.state.hd_path, new_path);
        self.hdk = None;
        self.registry.clear();
        self.emit(KeyringEvent::Locked);
    }

    /// Ask the device for the extended public key at `hd_path` (or the keyring's path).
    pub async fn unlock(&mut self, hd_path: Option<&str>) -> Result<UnlockOutcome> {
        if self.is_unlocked() && hd_path.is_none() {
            return Ok(UnlockOutcome::AlreadyUnlocked);
        }

        let path = match hd_path {
            Some(path) => to_device_path(path),
            None => self.state.hd_path.clone(),
        };
        debug!("unlocking device at {}", path);

        let reply = self
            .transport
            .send(ACTION_UNLOCK, &UnlockParams { hd_path: path })
            .await?;
        let payload: UnlockPayload = reply.into_payload("Unknown error")?;

        let hdk = ExtendedPublicKey::from_hex(&payload.public_key, &payload.chain_code)?;
        let address = match payload.address.as_deref() {
            Some(address) if !address.is_empty() => to_checksum_address(address)?,
            _ => hdk.address(),
        };
        // cached indexes belong to the previous key
        self.registry.clear();
        self.hdk = Some(hdk);

        info!("device unlocked ({})", address);
        self.emit(KeyringEvent::Unlocked { address: address.clone() });
        Ok(UnlockOutcome::Unlocked { address })
    }

    /// Return to an empty, locked keyring.
    pub fn forget_device(&mut self) {
        self.state.accounts.clear();
        self.state.account_indexes.clear();
        self.state.page = 0;
        self.state.unlocked_account = 0;
        self.registry.clear();
        self.hdk = None;
        info!("device forgotten");
        self.emit(KeyringEvent::DeviceForgotten);
    }
}
