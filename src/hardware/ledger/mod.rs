//! Ledger bridge integration
//!
//! - `messages`: wire format of bridge requests and replies
//! - `transport`: correlated request/reply channel with timeouts

pub mod messages;
pub mod transport;

pub use messages::{BridgeEnvelope, BridgeReply};
pub use transport::{bridge_origin, BridgeTransport, ChannelPort, InboundMessage, MessagePort};
