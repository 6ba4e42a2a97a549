//! Shared setup for the ticker binaries

pub mod common;
