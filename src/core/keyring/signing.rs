//! Transaction and personal-message signing
//!
//! ## Flow
//! ```text
//! unlock (no-op when already unlocked)
//!    ↓
//! address → index (path cache, then bounded scan) → device path
//!    ↓
//! bridge request, single outstanding per device
//!    ↓
//! local check: recover the signer and compare with the requested address
//! ```
//! Nothing is returned to the caller unless the local check passes.

use super::events::KeyringEvent;
use super::LedgerBridgeKeyring;
use crate::core::address::{checksum, to_checksum_address};
use crate::core::bip44::to_device_path;
use crate::core::errors::{KeyringError, Result};
use crate::hardware::ledger::messages::{
    SignMessageParams, SignMessagePayload, SignTransactionParams, SignTransactionPayload,
    ACTION_SIGN_PERSONAL_MESSAGE, ACTION_SIGN_TRANSACTION,
};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, RecoveryMessage, Signature, H256, U256};
use tracing::{info, warn};

/// A transaction together with the device signature that completes it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    pub tx: TypedTransaction,
    pub signature: Signature,
}

impl SignedTransaction {
    /// Signed RLP encoding, ready to broadcast.
    pub fn raw(&self) -> Bytes {
        self.tx.rlp_signed(&self.signature)
    }

    pub fn hash(&self) -> H256 {
        self.tx.hash(&self.signature)
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| KeyringError::InvalidSignature(format!("{} is not hex: {}", field, e)))
}

fn decode_scalar(field: &str, value: &str) -> Result<U256> {
    let bytes = decode_hex(field, value)?;
    if bytes.len() > 32 {
        return Err(KeyringError::InvalidSignature(format!("{} is {} bytes", field, bytes.len())));
    }
    Ok(U256::from_big_endian(&bytes))
}

fn decode_v(value: &str) -> Result<u64> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| KeyringError::InvalidSignature(format!("v is not hex: {}", e)))
}

/// `v` must carry the replay protection `tx` was built with: EIP-155
/// `{35,36} + 2 * chain_id` for legacy transactions with a chain id, 27/28
/// for legacy ones without, and a bare parity (0/1, or 27/28) for typed
/// envelopes. Typed parities come back as 0/1.
fn checked_v(tx: &TypedTransaction, v: u64) -> Result<u64> {
    let invalid = || KeyringError::InvalidSignature(format!("v = {} does not fit this transaction", v));
    match tx {
        TypedTransaction::Legacy(_) => match tx.chain_id() {
            Some(chain_id) => {
                let base = chain_id
                    .as_u64()
                    .checked_mul(2)
                    .and_then(|x| x.checked_add(35))
                    .ok_or_else(invalid)?;
                match v.checked_sub(base) {
                    Some(0) | Some(1) => Ok(v),
                    _ => Err(invalid()),
                }
            }
            None if v == 27 || v == 28 => Ok(v),
            None => Err(invalid()),
        },
        _ => match v {
            0 | 1 => Ok(v),
            27 | 28 => Ok(v - 27),
            _ => Err(invalid()),
        },
    }
}

/// `0x`-prefixed hex is taken as raw bytes, anything else as UTF-8 text.
pub(crate) fn message_bytes(message: &str) -> Vec<u8> {
    match message.strip_prefix("0x").map(hex::decode) {
        Some(Ok(bytes)) => bytes,
        _ => message.as_bytes().to_vec(),
    }
}

impl LedgerBridgeKeyring {
    /// Sign `tx` on the device with the key behind `address`.
    pub async fn sign_transaction(&mut self, address: &str, tx: TypedTransaction) -> Result<SignedTransaction> {
        self.unlock(None).await?;

        let signer = to_checksum_address(address)?;
        let hd_path = to_device_path(&self.path_from_address(&signer)?);
        let to = tx
            .to()
            .and_then(|to| to.as_address())
            .map(|to| format!("0x{}", hex::encode(to.as_bytes())))
            .unwrap_or_else(|| "0x".to_string());

        let params = SignTransactionParams {
            tx: hex::encode(tx.rlp()),
            hd_path,
            to,
        };
        let reply = self.transport.send(ACTION_SIGN_TRANSACTION, &params).await?;
        let payload: SignTransactionPayload =
            reply.into_payload("Ledger: Unknown error while signing transaction")?;

        let signature = Signature {
            r: decode_scalar("r", &payload.r)?,
            s: decode_scalar("s", &payload.s)?,
            v: checked_v(&tx, decode_v(&payload.v)?)?,
        };

        let recovered = signature
            .recover(tx.sighash())
            .map_err(|e| KeyringError::InvalidSignature(e.to_string()))?;
        if checksum(&recovered) != signer {
            warn!("transaction signature recovers to {:?}, expected {}", recovered, signer);
            return Err(KeyringError::InvalidSignature(format!(
                "signature recovers to {}, not {}",
                checksum(&recovered),
                signer
            )));
        }

        info!("transaction signed by {}", signer);
        self.emit(KeyringEvent::TransactionSigned { address: signer });
        Ok(SignedTransaction { tx, signature })
    }

    pub async fn sign_message(&mut self, address: &str, message: &str) -> Result<String> {
        self.sign_personal_message(address, message).await
    }

    /// EIP-191 personal message signature as `0x{r}{s}{v}` with `v` in {00, 01}.
    pub async fn sign_personal_message(&mut self, address: &str, message: &str) -> Result<String> {
        self.unlock(None).await?;

        let signer = to_checksum_address(address)?;
        let hd_path = to_device_path(&self.path_from_address(&signer)?);
        let data = message_bytes(message);

        let params = SignMessageParams {
            hd_path,
            message: hex::encode(&data),
        };
        let reply = self.transport.send(ACTION_SIGN_PERSONAL_MESSAGE, &params).await?;
        let payload: SignMessagePayload =
            reply.into_payload("Ledger: Unknown error while signing message")?;

        let v = if payload.v >= 27 { payload.v - 27 } else { payload.v };
        let signature_hex = format!(
            "0x{:0>64}{:0>64}{:02x}",
            payload.r.trim_start_matches("0x"),
            payload.s.trim_start_matches("0x"),
            v
        );

        let bytes = decode_hex("signature", &signature_hex)?;
        let signature = Signature::try_from(bytes.as_slice())
            .map_err(|e| KeyringError::InvalidSignature(e.to_string()))?;
        let recovered = signature
            .recover(RecoveryMessage::Data(data))
            .map_err(|e| KeyringError::InvalidSignature(e.to_string()))?;
        let recovered = checksum(&recovered);

        if recovered != signer {
            warn!("message signature recovers to {}, expected {}", recovered, signer);
            return Err(KeyringError::SignerMismatch {
                expected: signer,
                recovered,
            });
        }

        info!("personal message signed by {}", signer);
        self.emit(KeyringEvent::MessageSigned { address: signer });
        Ok(signature_hex)
    }

    pub fn sign_typed_data(&self, _address: &str, _typed_data: &serde_json::Value) -> Result<String> {
        Err(KeyringError::Unsupported("signTypedData".to_string()))
    }

    pub fn export_account(&self, _address: &str) -> Result<String> {
        Err(KeyringError::Unsupported("exportAccount".to_string()))
    }
}
