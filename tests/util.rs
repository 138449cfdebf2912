// tests/util.rs
// Shared test helpers: a simulated bridge device answering over a ChannelPort

#![allow(dead_code)]

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{H256, U256};
use hmac::{Hmac, Mac};
use ledger_bridge_keyring::hardware::ledger::messages::{
    BridgeEnvelope, ACTION_SIGN_PERSONAL_MESSAGE, ACTION_SIGN_TRANSACTION, ACTION_UNLOCK,
};
use ledger_bridge_keyring::{BridgeTransport, ChannelPort, KeyringConfig, LedgerBridgeKeyring};
use parking_lot::Mutex;
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use serde_json::{json, Value};
use sha2::Sha512;
use sha3::{Digest, Keccak256};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

pub const BRIDGE_URL: &str = "https://bridge.test/ledger/index.html";
pub const ORIGIN: &str = "https://bridge.test/ledger";
pub const CHAIN_ID: u64 = 8;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> KeyringConfig {
    KeyringConfig {
        bridge_url: BRIDGE_URL.to_string(),
        request_timeout_secs: 1,
        max_index: 50,
        ..Default::default()
    }
}

/// How the simulated device answers
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Honest,
    /// Signs with the key one index above the requested one
    WrongKey,
    /// Replies `success: false` with this error
    Reject(String),
    /// Never replies
    Silent,
    /// Replies without echoing the message id
    NoMessageId,
    /// Signs transactions with a 27/28 `v`, ignoring the chain id
    PreEip155,
}

/// Device holding an account-level extended private key.
pub struct SimulatedDevice {
    secret: SecretKey,
    chain_code: [u8; 32],
}

impl SimulatedDevice {
    pub fn new(seed: u8) -> Self {
        Self {
            secret: SecretKey::from_slice(&[seed; 32]).expect("valid test key"),
            chain_code: [seed.wrapping_add(1); 32],
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&Secp256k1::new(), &self.secret)
    }

    /// Uncompressed key as the Ledger app reports it
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().serialize_uncompressed())
    }

    pub fn chain_code_hex(&self) -> String {
        hex::encode(self.chain_code)
    }

    /// CKDpriv for a non-hardened child
    pub fn child_secret(&self, index: u32) -> SecretKey {
        let mut mac = Hmac::<Sha512>::new_from_slice(&self.chain_code).unwrap();
        mac.update(&self.public_key().serialize());
        mac.update(&index.to_be_bytes());
        let result = mac.finalize().into_bytes();
        let mut il = [0u8; 32];
        il.copy_from_slice(&result[..32]);
        self.secret.add_tweak(&Scalar::from_be_bytes(il).unwrap()).unwrap()
    }

    pub fn wallet(&self, index: u32) -> LocalWallet {
        LocalWallet::from_bytes(&self.child_secret(index).secret_bytes()).unwrap()
    }

    pub fn address_at(&self, index: u32) -> String {
        ethers::utils::to_checksum(&self.wallet(index).address(), None)
    }

    fn reply(&self, envelope: &BridgeEnvelope, behavior: &Behavior) -> Option<Value> {
        let reply_action = format!("{}-reply", envelope.action);
        let payload = match behavior {
            Behavior::Silent => return None,
            Behavior::Reject(error) => {
                return Some(json!({
                    "action": reply_action,
                    "success": false,
                    "payload": { "error": error },
                    "messageId": envelope.message_id,
                }))
            }
            _ => self.payload(envelope, behavior),
        };

        let mut reply = json!({ "action": reply_action, "success": true, "payload": payload });
        if *behavior != Behavior::NoMessageId {
            reply["messageId"] = json!(envelope.message_id);
        }
        Some(reply)
    }

    fn payload(&self, envelope: &BridgeEnvelope, behavior: &Behavior) -> Value {
        let params = &envelope.params;
        let signing_index = |params: &Value| {
            let index = index_of(params["hdPath"].as_str().unwrap());
            if *behavior == Behavior::WrongKey { index + 1 } else { index }
        };

        match envelope.action.as_str() {
            ACTION_UNLOCK => json!({
                "publicKey": self.public_key_hex(),
                "chainCode": self.chain_code_hex(),
                "address": self.address_of_master(),
            }),
            ACTION_SIGN_TRANSACTION => {
                let tx = hex::decode(params["tx"].as_str().unwrap()).unwrap();
                let hash = H256::from_slice(&Keccak256::digest(&tx));
                let sig = self.wallet(signing_index(params)).sign_hash(hash).unwrap();
                let v = match behavior {
                    Behavior::PreEip155 => sig.v,
                    _ => (sig.v - 27) + 35 + 2 * CHAIN_ID,
                };
                json!({ "v": format!("{:x}", v), "r": word(sig.r), "s": word(sig.s) })
            }
            ACTION_SIGN_PERSONAL_MESSAGE => {
                let message = hex::decode(params["message"].as_str().unwrap()).unwrap();
                let hash = ethers::utils::hash_message(&message);
                let sig = self.wallet(signing_index(params)).sign_hash(hash).unwrap();
                json!({ "v": sig.v, "r": word(sig.r), "s": word(sig.s) })
            }
            other => panic!("unexpected action {}", other),
        }
    }

    fn address_of_master(&self) -> String {
        let uncompressed = self.public_key().serialize_uncompressed();
        let hash = Keccak256::digest(&uncompressed[1..]);
        format!("0x{}", hex::encode(&hash[12..]))
    }
}

fn word(value: U256) -> String {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    hex::encode(buf)
}

/// Last component of a device path such as `44'/108'/0'/0/5`
pub fn index_of(path: &str) -> u32 {
    path.rsplit('/').next().unwrap().parse().unwrap()
}

pub struct Harness {
    pub keyring: LedgerBridgeKeyring,
    pub device: Arc<SimulatedDevice>,
    requests: Arc<Mutex<Vec<BridgeEnvelope>>>,
    behavior: Arc<Mutex<Behavior>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: KeyringConfig) -> Self {
        init_tracing();
        let (port, outbound) = ChannelPort::new();
        let keyring = LedgerBridgeKeyring::new(config, Arc::new(port));
        let device = Arc::new(SimulatedDevice::new(7));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let behavior = Arc::new(Mutex::new(Behavior::Honest));

        spawn_device(
            Arc::clone(&device),
            Arc::downgrade(keyring.transport()),
            outbound,
            Arc::clone(&requests),
            Arc::clone(&behavior),
        );

        Self { keyring, device, requests, behavior }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn requests(&self) -> Vec<BridgeEnvelope> {
        self.requests.lock().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.action).collect()
    }
}

fn spawn_device(
    device: Arc<SimulatedDevice>,
    transport: Weak<BridgeTransport>,
    mut outbound: mpsc::UnboundedReceiver<BridgeEnvelope>,
    requests: Arc<Mutex<Vec<BridgeEnvelope>>>,
    behavior: Arc<Mutex<Behavior>>,
) {
    tokio::spawn(async move {
        while let Some(envelope) = outbound.recv().await {
            requests.lock().push(envelope.clone());
            let behavior = behavior.lock().clone();
            let Some(reply) = device.reply(&envelope, &behavior) else { continue };
            let Some(transport) = transport.upgrade() else { break };
            // unrelated bridge chatter first; it must not disturb the pending request
            transport.deliver(ORIGIN, json!({ "action": "ledger-heartbeat" }));
            transport.deliver("https://elsewhere.test", reply.clone());
            transport.deliver(ORIGIN, reply);
        }
    });
}
