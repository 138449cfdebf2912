//! Session cache of address → derivation index
//!
//! Filled by pagination, consulted before falling back to a bounded
//! re-derivation scan. Owned by a single keyring and cleared whenever the
//! HD path changes or the device is forgotten; there is no other eviction.

use crate::core::address::to_checksum_address;
use crate::core::bip44::ExtendedPublicKey;
use crate::core::errors::{KeyringError, Result};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PathRegistry {
    paths: HashMap<String, u32>,
    max_index: u32,
}

impl PathRegistry {
    pub fn new(max_index: u32) -> Self {
        Self {
            paths: HashMap::new(),
            max_index,
        }
    }

    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    /// Cache `address` (any case) at `index`.
    pub fn register(&mut self, address: &str, index: u32) -> Result<()> {
        self.paths.insert(to_checksum_address(address)?, index);
        Ok(())
    }

    pub fn cached(&self, address: &str) -> Option<u32> {
        let checksummed = to_checksum_address(address).ok()?;
        self.paths.get(&checksummed).copied()
    }

    /// Cache lookup, then a linear scan over `0..max_index`.
    ///
    /// The scan costs one public derivation per index tried and does not
    /// populate the cache.
    pub fn resolve_index(&self, hdk: Option<&ExtendedPublicKey>, address: &str) -> Result<u32> {
        let checksummed = to_checksum_address(address)?;
        if let Some(index) = self.paths.get(&checksummed) {
            return Ok(*index);
        }

        let hdk = hdk.ok_or(KeyringError::NotUnlocked)?;
        debug!("address {} not cached, scanning {} indexes", checksummed, self.max_index);
        for index in 0..self.max_index {
            if hdk.address_at(index)? == checksummed {
                return Ok(index);
            }
        }

        Err(KeyringError::UnknownAddress(checksummed))
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
