//! Event loop behavior under paused tokio time

use std::sync::Arc;
use std::time::Duration;

use ticker_core::config::constants::MAX_PRICE_CHANGE_PCT;
use ticker_core::config::MemoryConfig;
use ticker_core::core::PauseReason;
use ticker_core::monitoring::MemoryMonitor;
use ticker_core::testing::{tokio_store, ScriptedHeapProbe};
use ticker_core::{Clock, EngineHandle, EngineService, TickerState};

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn points(handle: &EngineHandle, symbol: &str) -> usize {
    handle.snapshot().stock(symbol).unwrap().price_history.len()
}

#[tokio::test(start_paused = true)]
async fn test_ticks_follow_default_cadence() {
    let (handle, task) = EngineService::spawn(tokio_store(), None);
    let before: Arc<TickerState> = handle.snapshot();

    sleep_ms(1_999).await;
    assert_eq!(points(&handle, "BNOX"), 1);

    sleep_ms(2).await;
    let after = handle.snapshot();
    for (old, new) in before.stocks.iter().zip(after.stocks.iter()) {
        assert_eq!(new.price_history.len(), 2);
        assert_eq!(new.previous_price, old.current_price);
        assert!(
            (new.current_price - old.current_price).abs()
                <= old.current_price * MAX_PRICE_CHANGE_PCT + 1e-9
        );
    }

    sleep_ms(4_000).await;
    assert_eq!(points(&handle, "BNOX"), 4);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_ticks() {
    let (handle, task) = EngineService::spawn(tokio_store(), None);
    let mut rx = handle.subscribe();

    rx.changed().await.unwrap();
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.stock("MSFT").unwrap().price_history.len(), 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pause_cancels_pending_tick() {
    let (handle, task) = EngineService::spawn(tokio_store(), None);

    sleep_ms(1_000).await;
    assert!(handle.toggle_pause().await.unwrap());

    sleep_ms(10_000).await;
    assert_eq!(points(&handle, "GOOGL"), 1);

    // Resuming schedules a full interval from now, nothing buffered
    assert!(!handle.toggle_pause().await.unwrap());
    sleep_ms(1_500).await;
    assert_eq!(points(&handle, "GOOGL"), 1);

    sleep_ms(600).await;
    assert_eq!(points(&handle, "GOOGL"), 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_speed_change_reschedules() {
    let (handle, task) = EngineService::spawn(tokio_store(), None);

    handle.update_speed(500).await.unwrap();
    sleep_ms(1_250).await;

    assert_eq!(points(&handle, "BNOX"), 3);
    assert_eq!(handle.snapshot().update_interval_ms, 500);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_memory_pressure_pauses_simulation() {
    let monitor = MemoryMonitor::new(
        Arc::new(ScriptedHeapProbe::constant(500)),
        MemoryConfig::default(),
    );
    let period = monitor.config().check_interval_ms;
    let (handle, task) = EngineService::spawn(tokio_store(), Some(monitor));

    // No check before the first period has elapsed
    sleep_ms(period - 100).await;
    let state = handle.snapshot();
    assert!(!state.is_paused);
    assert!(state.memory_stats.is_none());

    sleep_ms(200).await;
    let state = handle.snapshot();
    assert!(state.is_paused);
    assert!(state.error.as_deref().unwrap().contains("500.0 MB"));
    assert_eq!(state.memory_stats.unwrap().used_mb(), 500.0);

    let frozen = points(&handle, "BNOX");
    sleep_ms(10 * period).await;
    assert_eq!(points(&handle, "BNOX"), frozen);

    // The banner can be dismissed; the pause stays until toggled
    handle.dismiss_error().await.unwrap();
    let state = handle.snapshot();
    assert!(state.error.is_none());
    assert!(state.is_paused);

    let last = handle.shutdown().await.unwrap();
    assert!(last.is_paused);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_returns_final_snapshot() {
    let (handle, task) = EngineService::spawn(tokio_store(), None);
    let mut rx = handle.subscribe();

    handle.set_price("GOOGL", 200.0).await.unwrap();
    let last = handle.shutdown().await.unwrap();
    assert_eq!(last.stock("GOOGL").unwrap().current_price, 200.0);
    assert_eq!(task.await.unwrap(), last);

    // Publisher is gone with the store; no tick can arrive any more
    let _ = rx.borrow_and_update();
    assert!(rx.changed().await.is_err());
    sleep_ms(10_000).await;
    assert_eq!(handle.snapshot(), last);
}

#[test]
fn test_pause_reason_is_exposed() {
    let (mut store, clock) = ticker_core::testing::test_store();
    store.force_pause(PauseReason::MemoryPressure, "over budget".into(), None);

    clock.advance(5_000);
    assert_eq!(store.scheduler().pause_reason(), Some(PauseReason::MemoryPressure));
    assert!(!store.run_due_tick(clock.now_ms()).unwrap());
}
