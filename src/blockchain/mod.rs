//! Chain-side collaborators reached over HTTP.

pub mod explorer;

pub use explorer::{ExplorerClient, TransactionHistory};
