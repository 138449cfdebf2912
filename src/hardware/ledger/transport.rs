//! Ledger bridge transport
//!
//! Request/reply channel to the sandboxed bridge page. Every request gets a
//! fresh correlation id and its own resolver in the request table; an entry
//! is removed exactly once, on a matching reply, on timeout, on a failed
//! post, or when the caller drops the request future. Messages from a
//! foreign origin or for another request never touch existing entries.
//!
//! The device services one request at a time, so requests on a transport
//! are queued behind an async mutex.

use super::messages::{reply_action, BridgeEnvelope, BridgeReply, REPLY_SUFFIX};
use crate::core::errors::{KeyringError, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Surface that carries envelopes to the bridge (an iframe, a webview, a socket...).
#[async_trait]
pub trait MessagePort: Send + Sync {
    async fn post_message(&self, envelope: BridgeEnvelope) -> Result<()>;
}

/// In-process port: envelopes are handed to whoever holds the receiver.
#[derive(Debug, Clone)]
pub struct ChannelPort {
    sender: mpsc::UnboundedSender<BridgeEnvelope>,
}

impl ChannelPort {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BridgeEnvelope>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessagePort for ChannelPort {
    async fn post_message(&self, envelope: BridgeEnvelope) -> Result<()> {
        self.sender
            .send(envelope)
            .map_err(|_| KeyringError::Transport("bridge channel closed".to_string()))
    }
}

/// A message received from the hosting surface together with its origin.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin: String,
    pub data: Value,
}

/// Bridge origin: the bridge URL minus its last path segment.
pub fn bridge_origin(bridge_url: &str) -> String {
    let mut parts: Vec<&str> = bridge_url.split('/').collect();
    parts.pop();
    parts.join("/")
}

struct PendingRequest {
    seq: u64,
    reply_action: String,
    responder: oneshot::Sender<BridgeReply>,
}

type RequestTable = Mutex<HashMap<Uuid, PendingRequest>>;

// Removes the table entry when the request finishes for any reason.
struct PendingGuard<'a> {
    table: &'a RequestTable,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.lock().remove(&self.id);
    }
}

pub struct BridgeTransport {
    port: Arc<dyn MessagePort>,
    origin: RwLock<String>,
    timeout: Duration,
    pending: RequestTable,
    next_seq: AtomicU64,
    queue: tokio::sync::Mutex<()>,
}

impl BridgeTransport {
    pub fn new(port: Arc<dyn MessagePort>, bridge_url: &str, timeout: Duration) -> Self {
        Self {
            port,
            origin: RwLock::new(bridge_origin(bridge_url)),
            timeout,
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            queue: tokio::sync::Mutex::new(()),
        }
    }

    pub fn origin(&self) -> String {
        self.origin.read().clone()
    }

    pub fn set_bridge_url(&self, bridge_url: &str) {
        *self.origin.write() = bridge_origin(bridge_url);
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Requests currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send `action` and wait for its reply.
    ///
    /// A failed reply (`success == false`) is still returned here; decoding it
    /// into an error is up to the caller.
    pub async fn send<P: Serialize + ?Sized>(&self, action: &str, params: &P) -> Result<BridgeReply> {
        let params = serde_json::to_value(params)?;
        let _slot = self.queue.lock().await;

        let id = Uuid::new_v4();
        let expected = reply_action(action);
        let (responder, reply) = oneshot::channel();
        self.pending.lock().insert(
            id,
            PendingRequest {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                reply_action: expected.clone(),
                responder,
            },
        );
        let _guard = PendingGuard { table: &self.pending, id };

        debug!("bridge request {} ({})", action, id);
        self.port.post_message(BridgeEnvelope::new(id, action, params)).await?;

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(reply)) => {
                debug!("bridge reply {} success={}", reply.action, reply.success);
                Ok(reply)
            }
            Ok(Err(_)) => Err(KeyringError::Transport(format!("{} was abandoned", action))),
            Err(_) => {
                warn!("no {} within {:?}", expected, self.timeout);
                Err(KeyringError::Timeout(format!("no {} within {:?}", expected, self.timeout)))
            }
        }
    }

    /// Route one inbound message. Returns whether it resolved a pending request.
    pub fn deliver(&self, origin: &str, data: Value) -> bool {
        if origin != self.origin.read().as_str() {
            debug!("ignoring bridge message from foreign origin {}", origin);
            return false;
        }

        let reply: BridgeReply = match serde_json::from_value(data) {
            Ok(reply) => reply,
            Err(_) => return false,
        };
        if !reply.action.ends_with(REPLY_SUFFIX) {
            return false;
        }

        let entry = {
            let mut pending = self.pending.lock();
            let id = match reply.message_id {
                Some(id) => pending
                    .get(&id)
                    .filter(|p| p.reply_action == reply.action)
                    .map(|_| id),
                None => pending
                    .iter()
                    .filter(|(_, p)| p.reply_action == reply.action)
                    .min_by_key(|(_, p)| p.seq)
                    .map(|(id, _)| *id),
            };
            match id.and_then(|id| pending.remove(&id)) {
                Some(entry) => entry,
                None => {
                    debug!("no pending request for {}", reply.action);
                    return false;
                }
            }
        };

        entry.responder.send(reply).is_ok()
    }

    /// Pump messages from the hosting surface into `deliver` until the stream
    /// ends or the transport is dropped.
    pub fn spawn_listener(self: &Arc<Self>, mut inbound: mpsc::UnboundedReceiver<InboundMessage>) -> JoinHandle<()> {
        let transport: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                let Some(transport) = transport.upgrade() else { break };
                transport.deliver(&message.origin, message.data);
            }
        })
    }
}
