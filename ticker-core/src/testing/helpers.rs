//! Store builders for tests
//!
//! Every builder seeds the default catalogue (BNOX, GOOGL, MSFT) with a
//! 2000ms cadence and a seeded random walk, so runs are reproducible.

use std::sync::Arc;

use super::mocks::ManualClock;
use crate::config::EngineConfig;
use crate::core::TokioClock;
use crate::engine::{PriceModel, RandomWalk, TickerStore};
use crate::storage::{KeyValueStore, MemoryStore, SecureStorage};

/// Seed for every builder's random walk
pub const TEST_SEED: u64 = 0x5eed;

/// Default configuration with a fixed price seed
pub fn test_config() -> EngineConfig {
    EngineConfig {
        price_seed: Some(TEST_SEED),
        ..EngineConfig::default()
    }
}

/// Store on a manual clock with in-memory storage
pub fn test_store() -> (TickerStore, Arc<ManualClock>) {
    store_with(test_config(), Arc::new(MemoryStore::new()))
}

/// Store on a manual clock with the given config and backend
pub fn store_with(
    config: EngineConfig,
    backend: Arc<dyn KeyValueStore>,
) -> (TickerStore, Arc<ManualClock>) {
    let model = RandomWalk::new(config.price_seed.or(Some(TEST_SEED)));
    store_with_model(config, backend, Box::new(model))
}

/// Store on a manual clock with an explicit price model
pub fn store_with_model(
    config: EngineConfig,
    backend: Arc<dyn KeyValueStore>,
    model: Box<dyn PriceModel>,
) -> (TickerStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let store = TickerStore::new(config, clock.clone(), model, SecureStorage::new(backend))
        .expect("test config is valid");
    (store, clock)
}

/// Store driven by tokio time, for use with the async service.
///
/// Call from inside a runtime (ideally with paused time).
pub fn tokio_store() -> TickerStore {
    tokio_store_with(test_config())
}

pub fn tokio_store_with(config: EngineConfig) -> TickerStore {
    let model = RandomWalk::new(config.price_seed.or(Some(TEST_SEED)));
    TickerStore::new(
        config,
        Arc::new(TokioClock::new()),
        Box::new(model),
        SecureStorage::new(Arc::new(MemoryStore::new())),
    )
    .expect("test config is valid")
}
