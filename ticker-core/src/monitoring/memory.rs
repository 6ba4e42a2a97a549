//! Heap sampling against a fixed budget
//!
//! The monitor only classifies samples. Acting on an over-budget sample
//! (forcing the scheduler into Paused) is the store's job, through
//! `TickerStore::apply_memory_sample`.
//!
//! Hosts without heap introspection use [`NoHeapProbe`], and every check
//! then reports [`MemoryCheck::Unavailable`], which callers treat as
//! within budget.

use std::sync::Arc;

use tracing::debug;

use crate::config::MemoryConfig;
use crate::core::MemoryStats;

/// Source of heap usage samples
pub trait HeapProbe: Send + Sync {
    /// Sample current usage, or `None` if the host cannot tell
    fn sample(&self, now_ms: u64) -> Option<MemoryStats>;
}

/// Samples the current process through libc
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessHeapProbe;

impl HeapProbe for ProcessHeapProbe {
    fn sample(&self, now_ms: u64) -> Option<MemoryStats> {
        let (total, used) = process_memory()?;
        Some(MemoryStats {
            heap_size_limit: address_space_limit(),
            total_heap_size: total,
            used_heap_size: used,
            last_checked: now_ms,
        })
    }
}

/// Host without heap introspection
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeapProbe;

impl HeapProbe for NoHeapProbe {
    fn sample(&self, _now_ms: u64) -> Option<MemoryStats> {
        None
    }
}

/// Virtual size and resident set, in bytes
#[cfg(target_os = "linux")]
fn process_memory() -> Option<(u64, u64)> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let mut fields = statm.split_whitespace();
    let size_pages: u64 = fields.next()?.parse().ok()?;
    let resident_pages: u64 = fields.next()?.parse().ok()?;

    // SAFETY: sysconf has no preconditions
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return None;
    }
    let page_size = page_size as u64;

    Some((size_pages * page_size, resident_pages * page_size))
}

#[cfg(target_os = "macos")]
fn process_memory() -> Option<(u64, u64)> {
    use std::mem::MaybeUninit;

    let mut info: MaybeUninit<libc::rusage> = MaybeUninit::uninit();
    // SAFETY: getrusage fills the struct when it returns 0
    unsafe {
        if libc::getrusage(libc::RUSAGE_SELF, info.as_mut_ptr()) == 0 {
            let info = info.assume_init();
            // ru_maxrss is in bytes on macOS
            let rss = info.ru_maxrss as u64;
            Some((rss, rss))
        } else {
            None
        }
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn process_memory() -> Option<(u64, u64)> {
    None
}

/// RLIMIT_AS in bytes, 0 when unlimited or unknown
#[cfg(unix)]
fn address_space_limit() -> u64 {
    use std::mem::MaybeUninit;

    let mut limit: MaybeUninit<libc::rlimit> = MaybeUninit::uninit();
    // SAFETY: getrlimit fills the struct when it returns 0
    unsafe {
        if libc::getrlimit(libc::RLIMIT_AS, limit.as_mut_ptr()) == 0 {
            let limit = limit.assume_init();
            if limit.rlim_cur == libc::RLIM_INFINITY {
                0
            } else {
                limit.rlim_cur as u64
            }
        } else {
            0
        }
    }
}

#[cfg(not(unix))]
fn address_space_limit() -> u64 {
    0
}

/// Outcome of one monitor tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCheck {
    /// Probe could not sample; assume within budget
    Unavailable,
    WithinBudget(MemoryStats),
    OverBudget(MemoryStats),
}

impl MemoryCheck {
    pub fn stats(&self) -> Option<MemoryStats> {
        match self {
            MemoryCheck::Unavailable => None,
            MemoryCheck::WithinBudget(stats) | MemoryCheck::OverBudget(stats) => Some(*stats),
        }
    }

    pub fn is_over_budget(&self) -> bool {
        matches!(self, MemoryCheck::OverBudget(_))
    }
}

/// Periodic heap check with peak tracking
pub struct MemoryMonitor {
    probe: Arc<dyn HeapProbe>,
    config: MemoryConfig,
    peak_used_bytes: u64,
    checks: u64,
}

impl MemoryMonitor {
    pub fn new(probe: Arc<dyn HeapProbe>, config: MemoryConfig) -> Self {
        Self {
            probe,
            config,
            peak_used_bytes: 0,
            checks: 0,
        }
    }

    /// Monitor over the current process
    pub fn for_process(config: MemoryConfig) -> Self {
        Self::new(Arc::new(ProcessHeapProbe), config)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Sample once and classify against the budget
    pub fn check(&mut self, now_ms: u64) -> MemoryCheck {
        self.checks += 1;

        let Some(stats) = self.probe.sample(now_ms) else {
            debug!("Heap introspection unavailable, skipping memory check");
            return MemoryCheck::Unavailable;
        };

        self.peak_used_bytes = self.peak_used_bytes.max(stats.used_heap_size);

        debug!(
            used_mb = format!("{:.2}", stats.used_mb()),
            budget_mb = self.config.max_usage_mb,
            peak_bytes = self.peak_used_bytes,
            "Memory sample"
        );

        if stats.used_heap_size > self.config.max_usage_bytes() {
            MemoryCheck::OverBudget(stats)
        } else {
            MemoryCheck::WithinBudget(stats)
        }
    }

    /// Highest used-heap sample seen so far
    pub fn peak_used_bytes(&self) -> u64 {
        self.peak_used_bytes
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }
}

impl std::fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("config", &self.config)
            .field("peak_used_bytes", &self.peak_used_bytes)
            .field("checks", &self.checks)
            .finish()
    }
}
