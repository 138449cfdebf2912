//! Error type for keyring operations.

use thiserror::Error;

/// Errors surfaced by the keyring, the bridge transport and their collaborators.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// Address derivation attempted before the device reported an extended public key.
    #[error("Ledger: keyring is locked, unlock the device first")]
    NotUnlocked,

    /// The bounded re-derivation scan found no index for the address.
    #[error("Unknown address: {0}")]
    UnknownAddress(String),

    /// The device or bridge reported a failure.
    #[error("Bridge error: {0}")]
    BridgeError(String),

    /// The v/r/s returned for a transaction do not verify against its signing hash.
    #[error("Ledger: The transaction signature is not valid: {0}")]
    InvalidSignature(String),

    /// The signature recovered to an address other than the requested signer.
    #[error("Ledger: The signature doesnt match the right address (expected {expected}, recovered {recovered})")]
    SignerMismatch { expected: String, recovered: String },

    #[error("Not supported on this device: {0}")]
    Unsupported(String),

    #[error("Address {0} not found in this keyring")]
    NotFound(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The message surface failed to deliver or was closed.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Network error: {0}")]
    Network(String),
}

pub type Result<T> = std::result::Result<T, KeyringError>;

impl KeyringError {
    /// Failures a caller may reasonably retry; the keyring itself never does.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeyringError::Timeout(_) | KeyringError::Transport(_) | KeyringError::Network(_)
        )
    }

    /// Errors caused by the request itself rather than by the device or environment.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            KeyringError::NotFound(_)
                | KeyringError::UnknownAddress(_)
                | KeyringError::Unsupported(_)
                | KeyringError::InvalidInput(_)
                | KeyringError::NotUnlocked
        )
    }
}

impl From<serde_json::Error> for KeyringError {
    fn from(err: serde_json::Error) -> Self {
        KeyringError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for KeyringError {
    fn from(err: toml::de::Error) -> Self {
        KeyringError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for KeyringError {
    fn from(err: reqwest::Error) -> Self {
        KeyringError::Network(err.to_string())
    }
}

impl From<hex::FromHexError> for KeyringError {
    fn from(err: hex::FromHexError) -> Self {
        KeyringError::InvalidInput(format!("invalid hex: {}", err))
    }
}
