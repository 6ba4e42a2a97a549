//! Behavioral properties of the ticker store
//!
//! Every test runs on a manual clock, so rate-limit windows and history
//! timestamps are exact.

use std::sync::Arc;

use approx::assert_relative_eq;
use proptest::prelude::*;
use ticker_core::config::constants::{
    MAX_HISTORY_POINTS, MAX_PRICE_CHANGE_PCT, RATE_LIMIT_WINDOW_MS, SET_PRICE_MAX_UPDATES,
};
use ticker_core::config::EngineConfig;
use ticker_core::core::{Clock, ErrorKind, ValidationError};
use ticker_core::data::validate_symbol;
use ticker_core::storage::MemoryStore;
use ticker_core::testing::{store_with, test_config, test_store};
use ticker_core::EngineError;

fn empty_config() -> EngineConfig {
    EngineConfig {
        stocks: Vec::new(),
        ..test_config()
    }
}

// ============================================================================
// Validation
// ============================================================================

proptest! {
    #[test]
    fn prop_add_then_history_is_single_point(
        symbol in "[A-Z]{1,5}",
        name in "[A-Za-z0-9][A-Za-z0-9 &.,-]{0,40}",
        price in 0.01f64..=1_000_000.0,
    ) {
        let (mut store, _clock) = store_with(empty_config(), Arc::new(MemoryStore::new()));

        let stored = store.add_stock(&symbol, &name, price).unwrap();
        prop_assert_eq!(&stored, &symbol);

        let history = store.get_stock_price_history(&symbol);
        prop_assert_eq!(history.len(), 1);
        prop_assert_eq!(history[0].price, price);

        let state = store.snapshot();
        prop_assert_eq!(state.selected_stock.as_deref(), Some(symbol.as_str()));
        prop_assert_eq!(state.stocks[0].percentage_change, 0.0);
        prop_assert_eq!(state.stocks[0].previous_price, price);
    }

    #[test]
    fn prop_malformed_symbol_rejected(symbol in "[A-Z]{0,3}[^A-Z][A-Z]{0,3}|[A-Z]{6,10}") {
        prop_assert!(validate_symbol(&symbol).is_err());
    }
}

#[test]
fn test_rejected_input_does_not_mutate() {
    let (mut store, _clock) = test_store();
    let before = store.snapshot();

    assert!(store.add_stock("!!!", "Nothing", 10.0).is_err());
    assert!(store.add_stock("NEW", "   ", 10.0).is_err());
    assert!(store.add_stock("NEW", "New Co", 0.0).is_err());
    assert!(store.add_stock("NEW", "New Co", f64::NAN).is_err());
    assert!(store.set_price("MSFT", 1_000_000.01).is_err());
    assert!(store.update_speed(50).is_err());

    let after = store.snapshot();
    assert_eq!(after.stocks, before.stocks);
    assert_eq!(after.update_interval_ms, before.update_interval_ms);
    // Nothing reached the rate limiter either
    assert_eq!(after.rate_limiters, before.rate_limiters);
}

#[test]
fn test_add_stock_sanitizes_inputs() {
    let (mut store, _clock) = test_store();

    let symbol = store.add_stock("nv-da!", "NVIDIA <Corp>", 120.0).unwrap();
    assert_eq!(symbol, "NVDA");
    assert_eq!(store.stock("NVDA").unwrap().name, "NVIDIA Corp");
    // Selection already set by the seed catalogue
    assert_eq!(store.snapshot().selected_stock.as_deref(), Some("BNOX"));
}

// ============================================================================
// Rate limiting
// ============================================================================

#[test]
fn test_set_price_ceiling_then_window_reset() {
    let (mut store, clock) = test_store();

    for i in 0..SET_PRICE_MAX_UPDATES {
        store
            .set_price("MSFT", 400.0 + i as f64)
            .unwrap_or_else(|e| panic!("call {} rejected: {}", i + 1, e));
    }

    let err = store.set_price("MSFT", 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    let last_accepted = 400.0 + (SET_PRICE_MAX_UPDATES - 1) as f64;
    assert_eq!(store.stock("MSFT").unwrap().current_price, last_accepted);

    // Still latched inside the window
    clock.advance(RATE_LIMIT_WINDOW_MS);
    assert!(store.set_price("MSFT", 1.0).is_err());

    clock.advance(1);
    store.set_price("MSFT", 1.0).unwrap();
    assert_eq!(store.stock("MSFT").unwrap().current_price, 1.0);
}

#[test]
fn test_set_price_limits_are_per_symbol() {
    let (mut store, _clock) = test_store();

    for _ in 0..SET_PRICE_MAX_UPDATES {
        store.set_price("MSFT", 400.0).unwrap();
    }
    assert!(store.set_price("MSFT", 400.0).is_err());

    store.set_price("GOOGL", 180.0).unwrap();
}

#[test]
fn test_catalogue_churn_shares_one_limit() {
    let config = EngineConfig {
        rate_limits: ticker_core::config::RateLimitConfig {
            add_stock: 2,
            ..Default::default()
        },
        ..test_config()
    };
    let (mut store, _clock) = store_with(config, Arc::new(MemoryStore::new()));

    store.add_stock("AAA", "A Co", 1.0).unwrap();
    store.add_stock("BBB", "B Co", 1.0).unwrap();
    let err = store.add_stock("CCC", "C Co", 1.0).unwrap_err();
    assert!(matches!(err, EngineError::RateLimited { ref action, .. } if action == "addStock"));
}

#[test]
fn test_update_speed_ceiling() {
    let (mut store, _clock) = test_store();

    for i in 0..10 {
        store.update_speed(1_000 + i).unwrap();
    }
    assert_eq!(store.update_speed(500).unwrap_err().kind(), ErrorKind::RateLimit);
    assert_eq!(store.snapshot().update_interval_ms, 1_009);
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_history_keeps_most_recent_points() {
    let (mut store, clock) = test_store();
    let updates = MAX_HISTORY_POINTS + 15;

    for n in 1..=updates {
        clock.advance(10);
        store.set_price("BNOX", 100.0 + n as f64).unwrap();
    }

    let history = store.get_stock_price_history("BNOX");
    assert_eq!(history.len(), MAX_HISTORY_POINTS);

    // Oldest retained is update N - MAX + 1, newest is N
    let oldest = updates - MAX_HISTORY_POINTS + 1;
    assert_eq!(history[0].price, 100.0 + oldest as f64);
    assert_eq!(history[MAX_HISTORY_POINTS - 1].price, 100.0 + updates as f64);
    assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn test_history_is_a_copy() {
    let (mut store, _clock) = test_store();

    let mut history = store.get_stock_price_history("MSFT");
    history.clear();
    store.set_price("MSFT", 1.0).unwrap();

    assert_eq!(store.get_stock_price_history("MSFT").len(), 2);
}

// ============================================================================
// Pause / cadence
// ============================================================================

#[test]
fn test_toggle_pause_twice_is_identity() {
    let (mut store, clock) = test_store();
    let before = store.snapshot();

    store.toggle_pause().unwrap();
    clock.advance(700);
    store.toggle_pause().unwrap();

    let after = store.snapshot();
    assert_eq!(after.is_paused, before.is_paused);
    assert_eq!(after.update_interval_ms, before.update_interval_ms);
    assert!(store.scheduler().is_running());
    assert_eq!(store.scheduler().interval_ms(), before.update_interval_ms);
    assert_eq!(
        store.next_tick_due(),
        Some(clock.now_ms() + before.update_interval_ms)
    );
}

#[test]
fn test_no_tick_while_paused() {
    let (mut store, clock) = test_store();
    store.toggle_pause().unwrap();

    clock.advance(10_000);
    assert!(!store.run_due_tick(clock.now_ms()).unwrap());
    assert_eq!(store.tick().unwrap(), 0);
    assert_eq!(store.get_stock_price_history("BNOX").len(), 1);
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_remove_only_selected_clears_selection() {
    let config = EngineConfig {
        stocks: vec![ticker_core::config::SeedStock::new("SOLO", "Solo Inc", 5.0)],
        ..test_config()
    };
    let (mut store, _clock) = store_with(config, Arc::new(MemoryStore::new()));
    assert_eq!(store.snapshot().selected_stock.as_deref(), Some("SOLO"));

    store.remove_stock("SOLO").unwrap();

    let state = store.snapshot();
    assert!(state.stocks.is_empty());
    assert_eq!(state.selected_stock, None);
}

#[test]
fn test_remove_selected_reselects_remaining() {
    let (mut store, _clock) = test_store();
    store.select_stock("GOOGL").unwrap();

    store.remove_stock("GOOGL").unwrap();

    let state = store.snapshot();
    let selected = state.selected_stock.as_deref().unwrap();
    assert!(state.contains(selected));
    assert_ne!(selected, "GOOGL");
}

#[test]
fn test_remove_unselected_keeps_selection() {
    let (mut store, _clock) = test_store();

    store.remove_stock("MSFT").unwrap();
    assert_eq!(store.snapshot().selected_stock.as_deref(), Some("BNOX"));
}

#[test]
fn test_select_and_remove_unknown() {
    let (mut store, _clock) = test_store();

    assert_eq!(store.select_stock("AAPL").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.remove_stock("AAPL").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        store.select_stock("").unwrap_err(),
        EngineError::Validation(ValidationError::EmptySymbol)
    );
}

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn test_override_then_tick_scenario() {
    let (mut store, clock) = test_store();
    assert_eq!(store.snapshot().update_interval_ms, 2_000);

    store.set_price("GOOGL", 200.0).unwrap();
    let googl = store.stock("GOOGL").unwrap();
    assert_eq!(googl.current_price, 200.0);
    assert_eq!(googl.previous_price, 176.30);
    assert_relative_eq!(googl.percentage_change, 13.44, epsilon = 0.01);

    let before = store.snapshot();
    clock.advance(2_000);
    assert!(store.run_due_tick(clock.now_ms()).unwrap());
    let after = store.snapshot();

    for (old, new) in before.stocks.iter().zip(after.stocks.iter()) {
        assert_eq!(old.symbol, new.symbol);
        assert_eq!(new.previous_price, old.current_price);

        let step = (new.current_price - old.current_price).abs();
        assert!(
            step <= old.current_price * MAX_PRICE_CHANGE_PCT + 1e-9,
            "{} moved {} from {}",
            new.symbol,
            step,
            old.current_price
        );

        let expected_pct =
            (new.current_price - new.previous_price) / new.previous_price * 100.0;
        assert_relative_eq!(new.percentage_change, expected_pct, epsilon = 1e-9);
        assert_eq!(new.last_updated, clock.now_ms());
    }
}
