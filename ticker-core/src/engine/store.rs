//! Ticker state store - the single writer of [`TickerState`]
//!
//! ## Mutation pipeline
//!
//! ```text
//!   caller op ──▶ clone draft ──▶ sanitize ▶ validate ▶ rate-limit ▶ business rule ▶ apply
//!                                   │            (all inside supervise)
//!                    ┌──────────────┴──────────────┐
//!                    ▼                             ▼
//!                  Ok(v)                         Err(e)
//!          publish draft, notify        keep limiter/retry accounting,
//!          sync scheduler               drop data changes, no notify
//!                                       (Internal: banner + severity policy)
//! ```
//!
//! Published snapshots are `Arc<TickerState>` values on a tokio `watch`
//! channel. A snapshot is never edited after publication.
//!
//! Rate-limit accounting is committed even when a later check fails: a
//! `set_price` on an unknown symbol still consumes one slot of
//! `setPrice-{symbol}`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::price_model::{PriceModel, RandomWalk};
use super::scheduler::Scheduler;
use crate::config::constants::{
    MAX_HISTORY_POINTS, MAX_STOCK_PRICE, MIN_STOCK_PRICE, SEVERE_ERROR_THRESHOLD,
};
use crate::config::EngineConfig;
use crate::core::{
    Clock, EngineError, MemoryStats, PauseReason, PersistedState, PricePoint, StockInfo,
    TickerState, ValidationError,
};
use crate::data::{
    clean_name, clean_symbol, sanitize_symbol, validate_interval, validate_name, validate_price,
    validate_symbol,
};
use crate::monitoring::MemoryCheck;
use crate::risk::rate_limiter::{
    set_price_key, ADD_STOCK_KEY, REMOVE_STOCK_KEY, SELECT_STOCK_KEY, UPDATE_SPEED_KEY,
};
use crate::resilience::supervise;
use crate::storage::{FileStore, MemoryStore, SecureStorage, StoredItem};

/// Retry key for snapshot saves
pub const SAVE_STATE_OP: &str = "saveState";
/// Retry key for snapshot loads
pub const LOAD_STATE_OP: &str = "loadState";

/// What an operation body can reach besides the draft
struct OpContext<'a> {
    config: &'a EngineConfig,
    model: &'a mut dyn PriceModel,
    storage: &'a SecureStorage,
    now_ms: u64,
}

pub struct TickerStore {
    state: Arc<TickerState>,
    publisher: watch::Sender<Arc<TickerState>>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    model: Box<dyn PriceModel>,
    storage: SecureStorage,
    scheduler: Scheduler,
    /// Consecutive internal errors; reset by any successful operation
    internal_error_streak: u32,
}

impl TickerStore {
    /// Seed the catalogue from `config.stocks`; the first one is selected.
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        model: Box<dyn PriceModel>,
        storage: SecureStorage,
    ) -> Result<Self, EngineError> {
        validate_interval(config.update_interval_ms)?;

        let now_ms = clock.now_ms();
        let mut state = TickerState::new(config.update_interval_ms, config.start_paused);

        for seed in &config.stocks {
            let symbol = clean_symbol(&seed.symbol)?;
            let name = clean_name(&seed.name)?;
            validate_price(seed.price)?;
            if state.contains(&symbol) {
                return Err(ValidationError::DuplicateSymbol { symbol }.into());
            }
            state.stocks.push(StockInfo::new(symbol, name, seed.price, now_ms));
        }
        state.selected_stock = state.stocks.first().map(|s| s.symbol.clone());

        let scheduler = Scheduler::new(config.update_interval_ms, config.start_paused, now_ms);

        info!(
            stocks = state.stocks.len(),
            interval_ms = config.update_interval_ms,
            paused = config.start_paused,
            model = model.name(),
            "Ticker store initialized"
        );

        let state = Arc::new(state);
        let (publisher, _) = watch::channel(Arc::clone(&state));

        Ok(Self {
            state,
            publisher,
            config,
            clock,
            model,
            storage,
            scheduler,
            internal_error_streak: 0,
        })
    }

    /// Store with a random-walk model and the backend named by
    /// `config.storage` (file-backed when a directory is set).
    pub fn from_config(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, EngineError> {
        let storage = match &config.storage.dir {
            Some(dir) => SecureStorage::new(Arc::new(FileStore::open(dir)?)),
            None => SecureStorage::new(Arc::new(MemoryStore::new())),
        };
        let model = Box::new(RandomWalk::new(config.price_seed));
        Self::new(config, clock, model, storage)
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    /// Current published snapshot
    pub fn snapshot(&self) -> Arc<TickerState> {
        Arc::clone(&self.state)
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<TickerState>> {
        self.publisher.subscribe()
    }

    pub fn stock(&self, symbol: &str) -> Option<StockInfo> {
        self.state.stock(symbol).cloned()
    }

    /// Copy of `symbol`'s history. Unknown or invalid symbols yield an
    /// empty history and a warning.
    pub fn get_stock_price_history(&self, symbol: &str) -> Vec<PricePoint> {
        let cleaned = sanitize_symbol(symbol);
        if let Err(e) = validate_symbol(&cleaned) {
            warn!(symbol = %symbol, error = %e, "History requested for invalid symbol");
            return Vec::new();
        }

        match self.state.stock(&cleaned) {
            Some(stock) => stock.price_history.clone(),
            None => {
                warn!(symbol = %cleaned, "History requested for unknown symbol");
                Vec::new()
            }
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Epoch-millisecond deadline of the next scheduler tick
    pub fn next_tick_due(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn internal_error_streak(&self) -> u32 {
        self.internal_error_streak
    }

    // ------------------------------------------------------------------
    // Caller operations
    // ------------------------------------------------------------------

    /// Override the price of an existing instrument
    pub fn set_price(&mut self, symbol: &str, price: f64) -> Result<(), EngineError> {
        self.run("setPrice", |draft, ctx| {
            let symbol = clean_symbol(symbol)?;
            validate_price(price)?;
            draft.rate_limiters.check(
                &set_price_key(&symbol),
                ctx.config.rate_limits.set_price(),
                ctx.now_ms,
            )?;

            let stock = draft
                .stock_mut(&symbol)
                .ok_or_else(|| EngineError::not_found(&symbol))?;
            stock.apply_price(price, ctx.now_ms);

            debug!(symbol = %symbol, price, change_pct = stock.percentage_change, "Price set");
            Ok(())
        })
    }

    /// Change the scheduler cadence
    pub fn update_speed(&mut self, interval_ms: u64) -> Result<(), EngineError> {
        self.run("updateSpeed", |draft, ctx| {
            validate_interval(interval_ms)?;
            draft.rate_limiters.check(
                UPDATE_SPEED_KEY,
                ctx.config.rate_limits.update_speed(),
                ctx.now_ms,
            )?;
            draft.update_interval_ms = interval_ms;
            Ok(())
        })
    }

    /// Flip between Running and Paused. Returns the new `is_paused`.
    pub fn toggle_pause(&mut self) -> Result<bool, EngineError> {
        self.run("togglePause", |draft, _| {
            draft.is_paused = !draft.is_paused;
            Ok(draft.is_paused)
        })
    }

    /// Add an instrument. Returns the sanitized symbol it was stored under.
    pub fn add_stock(
        &mut self,
        symbol: &str,
        name: &str,
        initial_price: f64,
    ) -> Result<String, EngineError> {
        self.run("addStock", |draft, ctx| {
            let symbol = clean_symbol(symbol)?;
            let name = clean_name(name)?;
            validate_price(initial_price)?;
            draft.rate_limiters.check(
                ADD_STOCK_KEY,
                ctx.config.rate_limits.add_stock(),
                ctx.now_ms,
            )?;

            if draft.contains(&symbol) {
                return Err(ValidationError::DuplicateSymbol { symbol }.into());
            }

            draft
                .stocks
                .push(StockInfo::new(symbol.clone(), name, initial_price, ctx.now_ms));
            if draft.selected_stock.is_none() {
                draft.selected_stock = Some(symbol.clone());
            }

            info!(symbol = %symbol, price = initial_price, "Stock added");
            Ok(symbol)
        })
    }

    /// Remove an instrument, moving the selection if it pointed there
    pub fn remove_stock(&mut self, symbol: &str) -> Result<(), EngineError> {
        self.run("removeStock", |draft, ctx| {
            let symbol = clean_symbol(symbol)?;
            if !draft.contains(&symbol) {
                return Err(EngineError::not_found(symbol));
            }
            draft.rate_limiters.check(
                REMOVE_STOCK_KEY,
                ctx.config.rate_limits.remove_stock(),
                ctx.now_ms,
            )?;

            draft.stocks.retain(|s| s.symbol != symbol);
            if draft.selected_stock.as_deref() == Some(symbol.as_str()) {
                draft.selected_stock = draft.stocks.first().map(|s| s.symbol.clone());
            }

            info!(
                symbol = %symbol,
                selected = ?draft.selected_stock,
                remaining = draft.stocks.len(),
                "Stock removed"
            );
            Ok(())
        })
    }

    pub fn select_stock(&mut self, symbol: &str) -> Result<(), EngineError> {
        self.run("selectStock", |draft, ctx| {
            let symbol = clean_symbol(symbol)?;
            if !draft.contains(&symbol) {
                return Err(EngineError::not_found(symbol));
            }
            draft.rate_limiters.check(
                SELECT_STOCK_KEY,
                ctx.config.rate_limits.select_stock(),
                ctx.now_ms,
            )?;
            draft.selected_stock = Some(symbol);
            Ok(())
        })
    }

    /// Clear the internal-error / memory banner
    pub fn dismiss_error(&mut self) {
        if self.state.error.is_none() {
            return;
        }
        let mut next = TickerState::clone(&self.state);
        next.error = None;
        self.publish(next);
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persist `stocks`, cadence, pause flag and selection
    pub fn save_state_to_storage(&mut self) -> Result<(), EngineError> {
        let result = self.run(SAVE_STATE_OP, |draft, ctx| {
            let persisted = draft.persisted();
            let policy = ctx.config.retry;
            let name = ctx.config.storage.name.as_str();
            let storage = ctx.storage;
            let now_ms = ctx.now_ms;

            draft.retry_trackers.with_retry(SAVE_STATE_OP, policy, now_ms, || {
                storage.persist(name, &persisted, now_ms).map_err(EngineError::from)
            })
        });

        match &result {
            Ok(()) => info!(
                stocks = self.state.stocks.len(),
                "State saved to storage"
            ),
            Err(e) => warn!(error = %e, "Failed to save state"),
        }
        result
    }

    /// Replace the persisted fields with the stored snapshot. Live rate
    /// limiters, retry trackers and memory stats are kept. On any failure
    /// the live state is left as it was.
    pub fn load_state_from_storage(&mut self) -> Result<(), EngineError> {
        let result = self.run(LOAD_STATE_OP, |draft, ctx| {
            let policy = ctx.config.retry;
            let name = ctx.config.storage.name.as_str();
            let storage = ctx.storage;

            let item: StoredItem<PersistedState> =
                draft
                    .retry_trackers
                    .with_retry(LOAD_STATE_OP, policy, ctx.now_ms, || {
                        storage.restore(name).map_err(EngineError::from)
                    })?;

            let restored = checked_restore(item.data)?;

            draft.stocks = restored.stocks;
            draft.update_interval_ms = restored.update_interval_ms;
            draft.is_paused = restored.is_paused;
            draft.selected_stock = restored.selected_stock;

            info!(
                stocks = draft.stocks.len(),
                saved_at = item.timestamp,
                "State loaded from storage"
            );
            Ok(())
        });

        if let Err(e) = &result {
            warn!(error = %e, "Failed to load state, keeping live state");
        }
        result
    }

    // ------------------------------------------------------------------
    // Scheduler and monitor entry points
    // ------------------------------------------------------------------

    /// Perturb every instrument once. No-op while paused.
    ///
    /// Returns the number of instruments updated.
    pub fn tick(&mut self) -> Result<usize, EngineError> {
        if !self.scheduler.is_running() {
            debug!("Tick skipped while paused");
            return Ok(0);
        }

        self.run("tick", |draft, ctx| {
            let mut updated = 0;
            for stock in draft.stocks.iter_mut() {
                let proposed = ctx.model.next_price(&stock.symbol, stock.current_price);
                if !proposed.is_finite() {
                    warn!(
                        symbol = %stock.symbol,
                        proposed,
                        "Price model produced a non-finite price, skipping"
                    );
                    continue;
                }
                stock.apply_price(proposed.clamp(MIN_STOCK_PRICE, MAX_STOCK_PRICE), ctx.now_ms);
                updated += 1;
            }
            Ok(updated)
        })
    }

    /// Run the scheduled tick if its deadline has passed.
    ///
    /// A failing tick still schedules the next one. Returns whether a tick
    /// was attempted.
    pub fn run_due_tick(&mut self, now_ms: u64) -> Result<bool, EngineError> {
        if !self.scheduler.is_due(now_ms) {
            return Ok(false);
        }
        let result = self.tick();
        self.scheduler.complete_tick(now_ms);
        result.map(|_| true)
    }

    /// Fold a memory monitor sample into the state; an over-budget sample
    /// force-pauses the simulation. Returns true if it paused.
    pub fn apply_memory_sample(&mut self, check: MemoryCheck) -> bool {
        let Some(stats) = check.stats() else {
            return false;
        };

        if check.is_over_budget() && !self.state.is_paused {
            let budget_mb = self.config.memory.max_usage_mb;
            warn!(
                used_mb = format!("{:.1}", stats.used_mb()),
                budget_mb,
                "Memory budget exceeded, pausing simulation"
            );
            let message = format!(
                "Memory usage {:.1} MB exceeds the {} MB budget; simulation paused",
                stats.used_mb(),
                budget_mb
            );
            return self.force_pause(PauseReason::MemoryPressure, message, Some(stats));
        }

        let mut next = TickerState::clone(&self.state);
        next.memory_stats = Some(stats);
        self.publish(next);
        false
    }

    /// Pause without a caller action, leaving `message` on the banner.
    /// Returns false if already paused.
    pub fn force_pause(
        &mut self,
        reason: PauseReason,
        message: String,
        memory_stats: Option<MemoryStats>,
    ) -> bool {
        let mut next = TickerState::clone(&self.state);
        if let Some(stats) = memory_stats {
            next.memory_stats = Some(stats);
        }

        let paused = !next.is_paused;
        if paused {
            next.is_paused = true;
            next.error = Some(message);
            self.scheduler.pause(reason);
        }

        self.publish(next);
        paused
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn run<T, F>(&mut self, operation: &'static str, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut TickerState, &mut OpContext<'_>) -> Result<T, EngineError>,
    {
        let now_ms = self.clock.now_ms();
        let mut draft = TickerState::clone(&self.state);

        let outcome = {
            let mut ctx = OpContext {
                config: &self.config,
                model: self.model.as_mut(),
                storage: &self.storage,
                now_ms,
            };
            supervise(operation, || f(&mut draft, &mut ctx))
        };

        match outcome {
            Ok(value) => {
                self.internal_error_streak = 0;
                self.publish(draft);
                self.sync_scheduler(now_ms);
                Ok(value)
            }
            Err(err) => {
                self.keep_accounting(draft);
                if matches!(err, EngineError::Internal { .. }) {
                    self.record_internal_error(&err);
                } else {
                    debug!(operation, error = %err, "Mutation rejected");
                }
                Err(err)
            }
        }
    }

    /// Scheduler follows the committed `is_paused` and cadence
    fn sync_scheduler(&mut self, now_ms: u64) {
        if self.state.is_paused {
            self.scheduler.pause(PauseReason::User);
        } else {
            self.scheduler.resume(now_ms);
        }
        self.scheduler.set_interval(self.state.update_interval_ms, now_ms);
    }

    /// Commit limiter and retry accounting from a failed draft, silently
    fn keep_accounting(&mut self, draft: TickerState) {
        if draft.rate_limiters == self.state.rate_limiters
            && draft.retry_trackers == self.state.retry_trackers
        {
            return;
        }

        let mut next = TickerState::clone(&self.state);
        next.rate_limiters = draft.rate_limiters;
        next.retry_trackers = draft.retry_trackers;

        let snapshot = Arc::new(next);
        self.state = Arc::clone(&snapshot);
        self.publisher.send_if_modified(|current| {
            *current = snapshot;
            false
        });
    }

    fn record_internal_error(&mut self, err: &EngineError) {
        self.internal_error_streak += 1;
        error!(
            error = %err,
            streak = self.internal_error_streak,
            "Internal error in store operation"
        );

        if self.internal_error_streak >= SEVERE_ERROR_THRESHOLD && !self.state.is_paused {
            error!(
                threshold = SEVERE_ERROR_THRESHOLD,
                "Repeated internal errors, pausing simulation"
            );
            self.force_pause(PauseReason::InternalError, err.to_string(), None);
            return;
        }

        let mut next = TickerState::clone(&self.state);
        next.error = Some(err.to_string());
        self.publish(next);
    }

    fn publish(&mut self, next: TickerState) {
        let snapshot = Arc::new(next);
        self.state = Arc::clone(&snapshot);
        self.publisher.send_replace(snapshot);
    }
}

impl std::fmt::Debug for TickerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerStore")
            .field("stocks", &self.state.stocks.len())
            .field("scheduler", &self.scheduler)
            .field("internal_error_streak", &self.internal_error_streak)
            .finish_non_exhaustive()
    }
}

/// Reject restored snapshots that violate the live invariants
fn checked_restore(mut restored: PersistedState) -> Result<PersistedState, EngineError> {
    validate_interval(restored.update_interval_ms)?;

    let mut seen = std::collections::HashSet::new();
    for stock in restored.stocks.iter_mut() {
        validate_symbol(&stock.symbol)?;
        validate_name(&stock.name)?;
        validate_price(stock.current_price)?;
        validate_price(stock.previous_price)?;
        if !seen.insert(stock.symbol.clone()) {
            return Err(ValidationError::DuplicateSymbol {
                symbol: stock.symbol.clone(),
            }
            .into());
        }
        if stock.price_history.len() > MAX_HISTORY_POINTS {
            let excess = stock.price_history.len() - MAX_HISTORY_POINTS;
            stock.price_history.drain(..excess);
        }
    }

    let dangling = restored
        .selected_stock
        .as_deref()
        .is_some_and(|s| !seen.contains(s));
    if dangling {
        warn!(
            selected = ?restored.selected_stock,
            "Stored selection does not exist, selecting first stock"
        );
        restored.selected_stock = restored.stocks.first().map(|s| s.symbol.clone());
    }

    Ok(restored)
}
