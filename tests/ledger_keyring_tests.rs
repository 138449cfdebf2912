//! Keyring lifecycle against a simulated bridge device

mod util;

use async_trait::async_trait;
use ledger_bridge_keyring::blockchain::TransactionHistory;
use ledger_bridge_keyring::core::errors::Result as KeyringResult;
use ledger_bridge_keyring::{KeyringError, KeyringEvent, KeyringSnapshot, LedgerBridgeKeyring, UnlockOutcome};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use util::{Behavior, Harness, ORIGIN};

#[tokio::test]
async fn test_unlock_installs_key_once() {
    let mut h = Harness::new();
    assert!(!h.keyring.is_unlocked());

    let outcome = h.keyring.unlock(None).await.unwrap();
    assert!(matches!(outcome, UnlockOutcome::Unlocked { .. }));
    assert!(h.keyring.is_unlocked());

    // default path goes out as configured
    let requests = h.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].action, "ledger-unlock");
    assert_eq!(requests[0].target, "LEDGER-IFRAME");
    assert_eq!(requests[0].params["hdPath"], "m/44'/108'/0'/0");

    assert_eq!(h.keyring.unlock(None).await.unwrap(), UnlockOutcome::AlreadyUnlocked);
    assert_eq!(h.requests().len(), 1);
}

#[tokio::test]
async fn test_unlock_with_explicit_path_always_asks_device() {
    let mut h = Harness::new();
    h.keyring.unlock(None).await.unwrap();
    h.keyring.unlock(Some("m/44'/60'/0'/0")).await.unwrap();

    let requests = h.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].params["hdPath"], "44'/60'/0'/0");
}

#[tokio::test]
async fn test_unlock_failure_is_bridge_error() {
    let mut h = Harness::new();
    h.set_behavior(Behavior::Reject("Ledger device is locked".to_string()));

    let err = h.keyring.unlock(None).await.unwrap_err();
    assert!(matches!(err, KeyringError::BridgeError(ref m) if m == "Ledger device is locked"));
    assert!(!h.keyring.is_unlocked());
}

#[tokio::test]
async fn test_unlock_times_out_and_cleans_up() {
    let mut h = Harness::new();
    h.set_behavior(Behavior::Silent);

    let err = h.keyring.unlock(None).await.unwrap_err();
    assert!(matches!(err, KeyringError::Timeout(_)));
    assert!(err.is_retryable());
    assert_eq!(h.keyring.transport().pending_count(), 0);

    h.set_behavior(Behavior::Honest);
    assert!(matches!(h.keyring.unlock(None).await.unwrap(), UnlockOutcome::Unlocked { .. }));
}

#[tokio::test]
async fn test_reply_without_message_id_is_accepted() {
    let mut h = Harness::new();
    h.set_behavior(Behavior::NoMessageId);
    assert!(h.keyring.unlock(None).await.is_ok());
}

#[tokio::test]
async fn test_add_accounts_replaces_list() {
    let mut h = Harness::new();
    h.keyring.set_account_to_unlock(2);

    let accounts = h.keyring.add_accounts(3).await.unwrap();
    let expected: Vec<String> = (2..5).map(|i| h.device.address_at(i)).collect();
    assert_eq!(accounts, expected);
    assert_eq!(h.keyring.get_accounts(), expected);
    assert_eq!(h.keyring.page(), 0);
    assert_eq!(h.keyring.serialize().account_indexes.get(&expected[1]), Some(&3));

    let accounts = h.keyring.add_accounts(1).await.unwrap();
    assert_eq!(accounts, vec![h.device.address_at(2)]);
    assert_eq!(h.keyring.serialize().account_indexes.len(), 1);
}

#[tokio::test]
async fn test_remove_unknown_account() {
    let mut h = Harness::new();
    h.keyring.add_accounts(1).await.unwrap();

    let missing = h.device.address_at(9);
    let err = h.keyring.remove_account(&missing).unwrap_err();
    assert!(matches!(err, KeyringError::NotFound(_)));
    assert!(err.to_string().contains(&missing));
    assert_eq!(h.keyring.get_accounts().len(), 1);
}

#[tokio::test]
async fn test_remove_account_is_case_insensitive() {
    let mut h = Harness::new();
    h.keyring.add_accounts(2).await.unwrap();
    let first = h.device.address_at(0);

    let mut events = h.keyring.subscribe();

    h.keyring.remove_account(&first.to_lowercase()).unwrap();
    assert_eq!(h.keyring.get_accounts(), vec![h.device.address_at(1)]);
    assert!(!h.keyring.serialize().account_indexes.contains_key(&first));
    assert_eq!(events.recv().await.unwrap(), KeyringEvent::AccountRemoved { address: first });
}

#[tokio::test]
async fn test_forget_device_resets() {
    let mut h = Harness::new();
    h.keyring.set_account_to_unlock(4);
    h.keyring.add_accounts(2).await.unwrap();
    h.keyring.get_first_page().await.unwrap();

    h.keyring.forget_device();
    assert!(h.keyring.get_accounts().is_empty());
    assert_eq!(h.keyring.page(), 0);
    assert_eq!(h.keyring.state().unlocked_account, 0);
    assert!(!h.keyring.is_unlocked());
}

#[tokio::test]
async fn test_hd_path_change_locks() {
    let mut h = Harness::new();
    h.keyring.get_first_page().await.unwrap();
    assert_eq!(h.keyring.cached_paths(), 5);

    h.keyring.set_hd_path("m/44'/108'/0'/0").unwrap();
    assert!(h.keyring.is_unlocked(), "same path keeps the key");
    assert_eq!(h.keyring.cached_paths(), 5);

    h.keyring.set_hd_path("m/44'/60'/0'/0").unwrap();
    assert!(!h.keyring.is_unlocked());
    assert_eq!(h.keyring.cached_paths(), 0);
    assert_eq!(h.keyring.hd_path(), "m/44'/60'/0'/0");

    assert!(matches!(h.keyring.set_hd_path("not a path"), Err(KeyringError::InvalidInput(_))));
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let mut h = Harness::new();
    h.keyring.set_hd_path("m/44'/60'/0'/0").unwrap();
    h.keyring.add_accounts(3).await.unwrap();
    let snapshot = h.keyring.serialize();

    let json = snapshot.to_json().unwrap();
    let mut restored = Harness::new();
    restored
        .keyring
        .deserialize(KeyringSnapshot::from_json(&json).unwrap())
        .unwrap();

    assert_eq!(restored.keyring.serialize(), snapshot);
    assert_eq!(restored.keyring.get_accounts(), h.keyring.get_accounts());
    assert!(!restored.keyring.is_unlocked());
}

#[tokio::test]
async fn test_deserialize_defaults_and_bridge_origin() {
    let mut h = Harness::new();
    h.keyring
        .deserialize(KeyringSnapshot {
            bridge_url: Some("https://other.test/bridge/page.html".to_string()),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(h.keyring.hd_path(), "m/44'/108'/0'/0");
    assert_eq!(h.keyring.transport().origin(), "https://other.test/bridge");
    assert_ne!(h.keyring.transport().origin(), ORIGIN);
}

#[tokio::test]
async fn test_deserialize_with_other_path_locks() {
    let mut h = Harness::new();
    let page = h.keyring.get_first_page().await.unwrap();
    let mut events = h.keyring.subscribe();

    h.keyring
        .deserialize(KeyringSnapshot {
            hd_path: Some("m/44'/60'/0'/0".to_string()),
            ..Default::default()
        })
        .unwrap();

    assert!(!h.keyring.is_unlocked());
    assert_eq!(h.keyring.cached_paths(), 0);
    assert_eq!(events.recv().await.unwrap(), KeyringEvent::Locked);
    // a locked keyring cannot answer for an address paged under the old path
    assert!(matches!(
        h.keyring.path_from_address(&page[2].address),
        Err(KeyringError::NotUnlocked)
    ));
}

#[tokio::test]
async fn test_deserialize_same_path_keeps_session() {
    let mut h = Harness::new();
    h.keyring.get_first_page().await.unwrap();

    let snapshot = h.keyring.serialize();
    h.keyring.deserialize(snapshot).unwrap();
    assert!(h.keyring.is_unlocked());
    assert_eq!(h.keyring.cached_paths(), 5);
}

#[tokio::test]
async fn test_deserialize_rejects_bad_path() {
    let mut h = Harness::new();
    let err = h
        .keyring
        .deserialize(KeyringSnapshot {
            hd_path: Some("44'/60'".to_string()),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, KeyringError::InvalidInput(_)));
    assert_eq!(h.keyring.hd_path(), "m/44'/108'/0'/0");
}

#[tokio::test]
async fn test_explicit_unlock_drops_cached_paths() {
    let mut h = Harness::new();
    h.keyring.get_first_page().await.unwrap();
    assert_eq!(h.keyring.cached_paths(), 5);

    h.keyring.unlock(Some("m/44'/60'/0'/0")).await.unwrap();
    assert!(h.keyring.is_unlocked());
    assert_eq!(h.keyring.cached_paths(), 0);
}

#[tokio::test]
async fn test_events_are_broadcast() {
    let mut h = Harness::new();
    let mut events = h.keyring.subscribe();

    h.keyring.add_accounts(1).await.unwrap();
    h.keyring.forget_device();

    assert!(matches!(events.recv().await.unwrap(), KeyringEvent::Unlocked { .. }));
    assert_eq!(
        events.recv().await.unwrap(),
        KeyringEvent::AccountsAdded { accounts: vec![h.device.address_at(0)] }
    );
    assert_eq!(events.recv().await.unwrap(), KeyringEvent::DeviceForgotten);
}

#[tokio::test]
async fn test_unsupported_operations() {
    let h = Harness::new();
    let address = h.device.address_at(0);
    assert!(matches!(
        h.keyring.sign_typed_data(&address, &serde_json::json!({})),
        Err(KeyringError::Unsupported(_))
    ));
    assert!(matches!(h.keyring.export_account(&address), Err(KeyringError::Unsupported(_))));
    assert_eq!(h.keyring.keyring_type(), "Ledger Hardware");
}

#[derive(Default)]
struct RecordingHistory {
    seen: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl TransactionHistory for RecordingHistory {
    async fn has_transactions(&self, api_url: &str, address: &str) -> KeyringResult<bool> {
        self.seen.lock().push((api_url.to_string(), address.to_string()));
        Ok(true)
    }
}

#[tokio::test]
async fn test_previous_transactions_use_network_table() {
    let h = Harness::new();
    let history = Arc::new(RecordingHistory::default());
    let mut keyring: LedgerBridgeKeyring = h.keyring.with_history(history.clone());

    let address = h.device.address_at(0);
    assert!(keyring.has_previous_transactions(&address.to_lowercase()).await.unwrap());

    keyring.set_network("unknown-net");
    assert_eq!(keyring.network(), "unknown-net");
    keyring.has_previous_transactions(&address).await.unwrap();

    let seen = history.seen.lock().clone();
    assert_eq!(
        seen,
        vec![
            ("https://rpc.octano.dev".to_string(), address.clone()),
            ("https://rpc.octano.dev".to_string(), address),
        ]
    );
}
