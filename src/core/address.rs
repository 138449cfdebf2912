//! Ethereum-style address helpers
//!
//! Addresses are kept EIP-55 checksum-cased in storage and compared
//! case-insensitively at the boundary.

use crate::core::errors::{KeyringError, Result};
use ethers::types::Address;
use secp256k1::PublicKey;
use sha3::{Digest, Keccak256};

/// Address of a secp256k1 public key: last 20 bytes of Keccak256(uncompressed key without 0x04).
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = Keccak256::digest(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// Parse an address in any letter case, with or without `0x`.
pub fn parse_address(address: &str) -> Result<Address> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(hex_part)
        .map_err(|e| KeyringError::InvalidInput(format!("invalid address {}: {}", address, e)))?;
    if bytes.len() != 20 {
        return Err(KeyringError::InvalidInput(format!(
            "address must be 20 bytes, got {}: {}",
            bytes.len(),
            address
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// EIP-55 checksum encoding
pub fn checksum(address: &Address) -> String {
    ethers::utils::to_checksum(address, None)
}

/// Normalize an address string to its checksum form.
pub fn to_checksum_address(address: &str) -> Result<String> {
    parse_address(address).map(|a| checksum(&a))
}

pub fn same_address(a: &str, b: &str) -> bool {
    a.trim_start_matches("0x").eq_ignore_ascii_case(b.trim_start_matches("0x"))
}
