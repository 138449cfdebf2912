#![allow(clippy::needless_return)]
#![allow(clippy::len_zero)]
// src/lib.rs

pub mod blockchain;
pub mod core;

// Ledger bridge transport
pub mod hardware;

pub use crate::core::{
    Account, KeyringConfig, KeyringError, KeyringEvent, KeyringSnapshot, LedgerBridgeKeyring,
    SignedTransaction, UnlockOutcome,
};
pub use crate::hardware::ledger::{BridgeTransport, ChannelPort, InboundMessage, MessagePort};
