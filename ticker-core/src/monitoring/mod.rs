//! Runtime monitoring
//!
//! Heap sampling with an auto-pause budget. Everything is reported through
//! `tracing`; there is no metrics exporter.

pub mod memory;

pub use memory::{HeapProbe, MemoryCheck, MemoryMonitor, NoHeapProbe, ProcessHeapProbe};
