//! Testing utilities for unit and integration tests
//!
//! Provides:
//! - Manual clock, scripted price model and heap probe, flaky storage
//! - Store builders seeded with the default catalogue

pub mod helpers;
pub mod mocks;

pub use helpers::*;
pub use mocks::{FlakyStore, ManualClock, ScriptedHeapProbe, ScriptedModel};
