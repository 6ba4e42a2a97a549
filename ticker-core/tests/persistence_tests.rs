//! Save/load through the store, corruption handling and the file backend

use std::sync::Arc;

use ticker_core::config::constants::MAX_RETRY_ATTEMPTS;
use ticker_core::config::{EngineConfig, StorageConfig};
use ticker_core::core::{ErrorKind, StorageError};
use ticker_core::storage::{storage_key, FileStore, KeyValueStore, MemoryStore};
use ticker_core::testing::{store_with, test_config, FlakyStore, ManualClock};
use ticker_core::{EngineError, TickerStore};

const KEY: &str = "secure_ticker_state";

#[test]
fn test_save_then_load_restores_persisted_fields() {
    let backend = MemoryStore::new();
    let (mut store, clock) = store_with(test_config(), Arc::new(backend.clone()));

    store.set_price("GOOGL", 200.0).unwrap();
    store.select_stock("MSFT").unwrap();
    store.update_speed(750).unwrap();
    store.toggle_pause().unwrap();
    let saved = store.snapshot().persisted();

    store.save_state_to_storage().unwrap();
    assert!(backend.get(KEY).unwrap().is_some());

    // Drift away from the saved state
    clock.advance(1_000);
    store.toggle_pause().unwrap();
    store.set_price("GOOGL", 150.0).unwrap();
    store.remove_stock("BNOX").unwrap();
    store.update_speed(300).unwrap();
    store.select_stock("GOOGL").unwrap();
    assert_ne!(store.snapshot().persisted(), saved);

    store.load_state_from_storage().unwrap();

    assert_eq!(store.snapshot().persisted(), saved);
    // Scheduler follows the restored pause flag and cadence
    assert!(!store.scheduler().is_running());
    assert_eq!(store.scheduler().interval_ms(), 750);
}

#[test]
fn test_load_keeps_live_rate_limiters() {
    let backend = MemoryStore::new();
    let (mut store, _clock) = store_with(test_config(), Arc::new(backend));

    store.save_state_to_storage().unwrap();
    store.set_price("MSFT", 400.0).unwrap();
    let limiters = store.snapshot().rate_limiters.clone();

    store.load_state_from_storage().unwrap();

    assert_eq!(store.snapshot().rate_limiters, limiters);
    assert_eq!(store.stock("MSFT").unwrap().current_price, 415.20);
}

#[test]
fn test_corrupted_blob_leaves_state_untouched() {
    let backend = MemoryStore::new();
    let (mut store, _clock) = store_with(test_config(), Arc::new(backend.clone()));
    store.save_state_to_storage().unwrap();

    store.set_price("MSFT", 123.0).unwrap();
    let live = store.snapshot();

    // Replace one character in the middle with a non-base64 byte
    let mut blob = backend.get(KEY).unwrap().unwrap().into_bytes();
    let mid = blob.len() / 2;
    blob[mid] = b'*';
    backend
        .set(KEY, &String::from_utf8(blob).unwrap())
        .unwrap();

    let err = store.load_state_from_storage().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(matches!(err, EngineError::Storage(StorageError::Decode(_))));

    let after = store.snapshot();
    assert_eq!(after.stocks, live.stocks);
    assert_eq!(after.selected_stock, live.selected_stock);
    assert_eq!(after.is_paused, live.is_paused);
}

#[test]
fn test_truncated_blob_fails_cleanly() {
    let backend = MemoryStore::new();
    let (mut store, _clock) = store_with(test_config(), Arc::new(backend.clone()));
    store.save_state_to_storage().unwrap();

    let blob = backend.get(KEY).unwrap().unwrap();
    // Cut on a base64 quantum boundary so decoding succeeds but parsing does not
    let cut = (blob.len() / 2) / 4 * 4;
    backend.set(KEY, &blob[..cut]).unwrap();

    let err = store.load_state_from_storage().unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::Parse(_))
    ));
}

#[test]
fn test_missing_snapshot_is_storage_error() {
    let (mut store, _clock) = store_with(test_config(), Arc::new(MemoryStore::new()));
    let before = store.snapshot();

    assert_eq!(
        store.load_state_from_storage(),
        Err(EngineError::Storage(StorageError::Missing { key: KEY.into() }))
    );
    assert_eq!(store.snapshot().stocks, before.stocks);
}

#[test]
fn test_save_retries_are_bounded() {
    let backend = FlakyStore::new(MemoryStore::new());
    let (mut store, clock) = store_with(test_config(), Arc::new(backend.clone()));
    backend.fail_next(100);

    for _ in 0..MAX_RETRY_ATTEMPTS {
        let err = store.save_state_to_storage().unwrap_err();
        assert!(matches!(err, EngineError::Storage(StorageError::Backend(_))));
    }

    // Budget spent: refused without touching the backend
    let err = store.save_state_to_storage().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RetryExhausted);

    // After the cooldown (2 x retry delay) the counter resets
    backend.fail_next(0);
    clock.advance(store.config().retry.cooldown_ms() + 1);
    store.save_state_to_storage().unwrap();

    let tracker = store
        .snapshot()
        .retry_trackers
        .tracker("saveState")
        .cloned()
        .unwrap();
    assert_eq!(tracker.attempts, 0);
}

#[test]
fn test_file_store_round_trip_across_stores() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        storage: StorageConfig {
            dir: Some(dir.path().to_path_buf()),
            ..StorageConfig::default()
        },
        ..test_config()
    };

    let clock = Arc::new(ManualClock::new());
    let mut first = TickerStore::from_config(config.clone(), clock.clone()).unwrap();
    first.add_stock("AMD", "Advanced Micro Devices", 155.5).unwrap();
    first.select_stock("AMD").unwrap();
    first.save_state_to_storage().unwrap();
    let saved = first.snapshot().persisted();
    drop(first);

    assert!(dir.path().join(storage_key("state")).exists());

    clock.advance(60_000);
    let mut second = TickerStore::from_config(config, clock).unwrap();
    assert_eq!(second.snapshot().stocks.len(), 3);

    second.load_state_from_storage().unwrap();
    assert_eq!(second.snapshot().persisted(), saved);
    assert_eq!(second.snapshot().selected_stock.as_deref(), Some("AMD"));
}

#[test]
fn test_file_backend_shared_between_handles() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FileStore::open(dir.path()).unwrap();
    let reader = FileStore::open(dir.path()).unwrap();

    writer.set(KEY, "blob").unwrap();
    assert_eq!(reader.get(KEY).unwrap().as_deref(), Some("blob"));
}
