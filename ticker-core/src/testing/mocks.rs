//! Programmable stand-ins for the engine's seams
//!
//! - [`ManualClock`]: time that only moves when told to
//! - [`ScriptedModel`]: price model replaying a fixed list of prices
//! - [`ScriptedHeapProbe`]: heap probe replaying a fixed list of samples
//! - [`FlakyStore`]: key-value backend that fails a set number of times

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::constants::BYTES_PER_MB;
use crate::core::{Clock, MemoryStats, StorageError};
use crate::engine::PriceModel;
use crate::monitoring::HeapProbe;
use crate::storage::{KeyValueStore, MemoryStore};

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// 2023-11-14T22:13:20Z
    pub const START_MS: u64 = 1_700_000_000_000;

    pub fn new() -> Self {
        Self::at(Self::START_MS)
    }

    pub fn at(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Price model replaying scripted prices in call order
///
/// Once the script runs out, prices stay flat.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    prices: VecDeque<f64>,
    panic_on_call: bool,
    calls: u64,
}

impl ScriptedModel {
    pub fn new(prices: Vec<f64>) -> Self {
        Self {
            prices: prices.into(),
            panic_on_call: false,
            calls: 0,
        }
    }

    /// Model that panics on every call
    pub fn panicking() -> Self {
        Self {
            prices: VecDeque::new(),
            panic_on_call: true,
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl PriceModel for ScriptedModel {
    fn next_price(&mut self, symbol: &str, current: f64) -> f64 {
        self.calls += 1;
        if self.panic_on_call {
            panic!("scripted model failure for {}", symbol);
        }
        self.prices.pop_front().unwrap_or(current)
    }

    fn name(&self) -> &'static str {
        "ScriptedModel"
    }
}

/// Heap probe replaying used-heap samples in megabytes
///
/// `None` entries model a host without introspection. The last sample
/// repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedHeapProbe {
    samples: Mutex<VecDeque<Option<u64>>>,
    last: Mutex<Option<u64>>,
}

impl ScriptedHeapProbe {
    pub fn new(samples_mb: Vec<Option<u64>>) -> Self {
        Self {
            samples: Mutex::new(samples_mb.into()),
            last: Mutex::new(None),
        }
    }

    /// Same sample forever
    pub fn constant(used_mb: u64) -> Self {
        Self::new(vec![Some(used_mb)])
    }
}

impl HeapProbe for ScriptedHeapProbe {
    fn sample(&self, now_ms: u64) -> Option<MemoryStats> {
        let mut last = self.last.lock();
        if let Some(next) = self.samples.lock().pop_front() {
            *last = next;
        }

        last.map(|used_mb| MemoryStats {
            heap_size_limit: 0,
            total_heap_size: used_mb * BYTES_PER_MB,
            used_heap_size: used_mb * BYTES_PER_MB,
            last_checked: now_ms,
        })
    }
}

/// In-memory backend that fails the next `n` reads or writes
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failures_left: Arc<AtomicU32>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failures_left: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(StorageError::Backend("injected failure".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.maybe_fail()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}
