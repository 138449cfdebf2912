//! Hardware wallet integration
//!
//! Devices are reached through a sandboxed bridge rather than directly over HID.

pub mod ledger;

pub use ledger::{BridgeTransport, ChannelPort, MessagePort};
