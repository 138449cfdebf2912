//! BIP32/BIP44 public derivation
//!
//! Implements the public half of BIP32 (CKDpub) on top of the extended
//! public key the device reports on unlock. Only non-hardened children can
//! be derived this way; private key material never enters this module.
//!
//! Path format: m/44'/coin_type'/account'/change, with the address index
//! appended by the keyring.

use crate::core::address::{checksum, public_key_to_address};
use crate::core::errors::{KeyringError, Result};
use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, Secp256k1};
use sha2::Sha512;
use std::fmt;

type HmacSha512 = Hmac<Sha512>;

pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Parsed derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdPath {
    pub components: Vec<u32>,
}

impl HdPath {
    /// Parse a path such as `m/44'/108'/0'/0`. Hardened components may use `'` or `h`.
    pub fn parse(path: &str) -> Result<Self> {
        let rest = if path == "m" {
            ""
        } else {
            path.strip_prefix("m/").ok_or_else(|| {
                KeyringError::InvalidInput(format!("path must start with m/: {}", path))
            })?
        };

        let mut components = Vec::new();
        if rest.is_empty() {
            return Ok(Self { components });
        }

        for part in rest.split('/') {
            let hardened = part.ends_with('\'') || part.ends_with('h');
            let digits = part.trim_end_matches('\'').trim_end_matches('h');
            if digits.is_empty() {
                return Err(KeyringError::InvalidInput(format!("empty path component in {}", path)));
            }
            let index: u32 = digits
                .parse()
                .map_err(|_| KeyringError::InvalidInput(format!("invalid path component {} in {}", part, path)))?;
            if index >= HARDENED_OFFSET {
                return Err(KeyringError::InvalidInput(format!("path component out of range: {}", part)));
            }
            components.push(if hardened { index | HARDENED_OFFSET } else { index });
        }

        Ok(Self { components })
    }

    pub fn child(&self, index: u32) -> Self {
        let mut components = self.components.clone();
        components.push(index);
        Self { components }
    }
}

impl fmt::Display for HdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for c in &self.components {
            if c & HARDENED_OFFSET != 0 {
                write!(f, "/{}'", c & !HARDENED_OFFSET)?;
            } else {
                write!(f, "/{}", c)?;
            }
        }
        Ok(())
    }
}

/// `{hd_path}/{index}`
pub fn path_for_index(hd_path: &str, index: u32) -> String {
    format!("{}/{}", hd_path, index)
}

/// Device path format: the leading `m/` root is stripped.
pub fn to_device_path(path: &str) -> String {
    path.replacen("m/", "", 1)
}

/// Public key plus chain code reported by the device for the account-level path.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    public_key: PublicKey,
    chain_code: [u8; 32],
}

impl fmt::Debug for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPublicKey")
            .field("public_key", &hex::encode(self.public_key.serialize()))
            .finish_non_exhaustive()
    }
}

impl ExtendedPublicKey {
    pub fn new(public_key: &[u8], chain_code: &[u8]) -> Result<Self> {
        let public_key = PublicKey::from_slice(public_key)
            .map_err(|e| KeyringError::Derivation(format!("invalid public key: {}", e)))?;
        let chain_code: [u8; 32] = chain_code.try_into().map_err(|_| {
            KeyringError::Derivation(format!("chain code must be 32 bytes, got {}", chain_code.len()))
        })?;
        Ok(Self { public_key, chain_code })
    }

    /// Build from the hex fields of an unlock reply (with or without `0x`).
    pub fn from_hex(public_key: &str, chain_code: &str) -> Result<Self> {
        let public_key = hex::decode(public_key.trim_start_matches("0x"))?;
        let chain_code = hex::decode(chain_code.trim_start_matches("0x"))?;
        Self::new(&public_key, &chain_code)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// CKDpub: I = HMAC-SHA512(chain_code, serP(K) || ser32(i)), K_i = K + I_L·G
    pub fn derive_child(&self, index: u32) -> Result<Self> {
        if index >= HARDENED_OFFSET {
            return Err(KeyringError::Derivation(format!(
                "cannot derive hardened child {} from a public key",
                index & !HARDENED_OFFSET
            )));
        }

        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|e| KeyringError::Derivation(format!("HMAC initialization failed: {}", e)))?;
        mac.update(&self.public_key.serialize());
        mac.update(&index.to_be_bytes());
        let result = mac.finalize().into_bytes();

        let mut il = [0u8; 32];
        il.copy_from_slice(&result[..32]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&result[32..]);

        let tweak = Scalar::from_be_bytes(il)
            .map_err(|_| KeyringError::Derivation(format!("invalid child index {}", index)))?;
        let secp = Secp256k1::verification_only();
        let public_key = self
            .public_key
            .add_exp_tweak(&secp, &tweak)
            .map_err(|e| KeyringError::Derivation(format!("child {} is invalid: {}", index, e)))?;

        Ok(Self { public_key, chain_code })
    }

    /// Derive along a path relative to this key, e.g. `m/3` or `m/0/7`.
    pub fn derive_path(&self, path: &str) -> Result<Self> {
        let path = HdPath::parse(path)?;
        let mut current = self.clone();
        for index in path.components {
            current = current.derive_child(index)?;
        }
        Ok(current)
    }

    pub fn address(&self) -> String {
        checksum(&public_key_to_address(&self.public_key))
    }

    /// Checksummed address of child `index` (path `m/{index}`).
    pub fn address_at(&self, index: u32) -> Result<String> {
        Ok(self.derive_child(index)?.address())
    }
}

/// Checksummed address at `path_suffix` below `key`; fails while locked.
pub fn derive_address(key: Option<&ExtendedPublicKey>, path_suffix: &str) -> Result<String> {
    let key = key.ok_or(KeyringError::NotUnlocked)?;
    Ok(key.derive_path(path_suffix)?.address())
}
