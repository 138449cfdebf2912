pub mod address;
pub mod bip44;
pub mod config;
pub mod errors;
pub mod keyring;
pub mod path_registry;

// Re-export key types
pub use config::KeyringConfig;
pub use errors::{KeyringError, Result};
pub use keyring::{Account, KeyringEvent, KeyringSnapshot, LedgerBridgeKeyring, SignedTransaction, UnlockOutcome};
