//! Bridge wire messages
//!
//! Requests carry `target = "LEDGER-IFRAME"` and a generated `messageId`;
//! replies are recognised by `"{action}-reply"` and, when the bridge echoes
//! it, the same `messageId`.

use crate::core::errors::{KeyringError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const IFRAME_TARGET: &str = "LEDGER-IFRAME";
pub const REPLY_SUFFIX: &str = "-reply";

pub const ACTION_UNLOCK: &str = "ledger-unlock";
pub const ACTION_SIGN_TRANSACTION: &str = "ledger-sign-transaction";
pub const ACTION_SIGN_PERSONAL_MESSAGE: &str = "ledger-sign-personal-message";

pub fn reply_action(action: &str) -> String {
    format!("{}{}", action, REPLY_SUFFIX)
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeEnvelope {
    pub target: String,
    pub action: String,
    pub params: Value,
    pub message_id: Uuid,
}

impl BridgeEnvelope {
    pub fn new(message_id: Uuid, action: &str, params: Value) -> Self {
        Self {
            target: IFRAME_TARGET.to_string(),
            action: action.to_string(),
            params,
            message_id,
        }
    }
}

/// Incoming reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeReply {
    pub action: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
}

impl BridgeReply {
    /// Decode a successful payload, or turn a failed reply into `BridgeError`
    /// carrying the bridge's message or `fallback`.
    pub fn into_payload<T: DeserializeOwned>(self, fallback: &str) -> Result<T> {
        if !self.success {
            let error = serde_json::from_value::<ErrorPayload>(self.payload)
                .ok()
                .and_then(|p| p.error)
                .unwrap_or_else(|| fallback.to_string());
            return Err(KeyringError::BridgeError(error));
        }
        serde_json::from_value(self.payload).map_err(|e| {
            KeyringError::BridgeError(format!("malformed {} payload: {}", self.action, e))
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, deserialize_with = "error_text")]
    pub error: Option<String>,
}

// Bridges report errors as plain strings or as `{ message }` objects.
fn error_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(Value::Object(map).to_string())),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockParams {
    pub hd_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockPayload {
    pub public_key: String,
    pub chain_code: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionParams {
    /// Unsigned serialized transaction, hex without `0x`
    pub tx: String,
    pub hd_path: String,
    /// Lowercase destination address
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignTransactionPayload {
    pub v: String,
    pub r: String,
    pub s: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageParams {
    pub hd_path: String,
    /// Message bytes, hex without `0x`
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignMessagePayload {
    pub v: u64,
    pub r: String,
    pub s: String,
}
