//! Async driver: one event loop owning the store
//!
//! ```text
//!   EngineHandle ──mpsc Command──▶ ┌──────────────────────────────┐
//!   EngineHandle ◀──oneshot reply── │ EngineService::run           │
//!                                   │   select! {                  │
//!                                   │     command                  │
//!                                   │     scheduler deadline       │──▶ TickerStore
//!                                   │     memory check interval    │
//!                                   │   }                          │
//!   watch::Receiver ◀── snapshots ─ └──────────────────────────────┘
//! ```
//!
//! Commands, ticks and memory checks all run to completion on the same
//! task, so none of them observe another half-applied. The tick sleep is
//! rebuilt from the scheduler deadline on every loop turn: pausing drops it
//! and a cadence change replaces it. Shutdown (explicit, or every handle
//! dropped) ends the loop and drops both timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::store::TickerStore;
use crate::core::{EngineError, PricePoint, TickerState};
use crate::monitoring::MemoryMonitor;

/// Pending commands before callers wait for capacity
const COMMAND_QUEUE_DEPTH: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

#[derive(Debug)]
enum Command {
    SetPrice {
        symbol: String,
        price: f64,
        reply: Reply<()>,
    },
    UpdateSpeed {
        interval_ms: u64,
        reply: Reply<()>,
    },
    TogglePause {
        reply: Reply<bool>,
    },
    AddStock {
        symbol: String,
        name: String,
        initial_price: f64,
        reply: Reply<String>,
    },
    RemoveStock {
        symbol: String,
        reply: Reply<()>,
    },
    SelectStock {
        symbol: String,
        reply: Reply<()>,
    },
    PriceHistory {
        symbol: String,
        reply: Reply<Vec<PricePoint>>,
    },
    SaveState {
        reply: Reply<()>,
    },
    LoadState {
        reply: Reply<()>,
    },
    DismissError {
        reply: Reply<()>,
    },
    Shutdown {
        reply: oneshot::Sender<Arc<TickerState>>,
    },
}

/// Owns the store and runs its event loop
pub struct EngineService {
    store: TickerStore,
    monitor: Option<MemoryMonitor>,
    commands: mpsc::Receiver<Command>,
    ticks_run: u64,
    commands_handled: u64,
}

impl EngineService {
    /// Create the service and the first handle to it.
    ///
    /// Without a monitor no memory checks run.
    pub fn new(store: TickerStore, monitor: Option<MemoryMonitor>) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let handle = EngineHandle {
            commands: tx,
            snapshots: store.subscribe(),
        };

        let service = Self {
            store,
            monitor,
            commands: rx,
            ticks_run: 0,
            commands_handled: 0,
        };
        (service, handle)
    }

    /// Spawn the loop on the current tokio runtime
    pub fn spawn(
        store: TickerStore,
        monitor: Option<MemoryMonitor>,
    ) -> (EngineHandle, JoinHandle<Arc<TickerState>>) {
        let (service, handle) = Self::new(store, monitor);
        (handle, tokio::spawn(service.run()))
    }

    /// Run until shutdown. Returns the final snapshot.
    pub async fn run(mut self) -> Arc<TickerState> {
        let mut memory_timer = self.monitor.as_ref().map(|m| memory_interval(m.config().check_interval_ms));

        info!(
            memory_checks = memory_timer.is_some(),
            interval_ms = self.store.scheduler().interval_ms(),
            "Engine service started"
        );

        let mut shutdown_reply = None;

        loop {
            let tick_in = self
                .store
                .next_tick_due()
                .map(|due| Duration::from_millis(due.saturating_sub(self.store.now_ms())));

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        debug!("All engine handles dropped");
                        break;
                    }
                },

                _ = sleep_for(tick_in) => {
                    let now_ms = self.store.now_ms();
                    match self.store.run_due_tick(now_ms) {
                        Ok(true) => self.ticks_run += 1,
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "Scheduler tick failed"),
                    }
                }

                _ = next_memory_check(&mut memory_timer) => {
                    if let Some(monitor) = self.monitor.as_mut() {
                        let check = monitor.check(self.store.now_ms());
                        self.store.apply_memory_sample(check);
                    }
                }
            }
        }

        // Timers are dropped with this frame
        drop(memory_timer);

        let snapshot = self.store.snapshot();
        info!(
            ticks = self.ticks_run,
            commands = self.commands_handled,
            stocks = snapshot.stocks.len(),
            "Engine service stopped"
        );

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(Arc::clone(&snapshot));
        }
        snapshot
    }

    fn handle(&mut self, command: Command) {
        self.commands_handled += 1;

        // A dropped reply receiver means the caller stopped waiting
        match command {
            Command::SetPrice {
                symbol,
                price,
                reply,
            } => {
                let _ = reply.send(self.store.set_price(&symbol, price));
            }
            Command::UpdateSpeed { interval_ms, reply } => {
                let _ = reply.send(self.store.update_speed(interval_ms));
            }
            Command::TogglePause { reply } => {
                let _ = reply.send(self.store.toggle_pause());
            }
            Command::AddStock {
                symbol,
                name,
                initial_price,
                reply,
            } => {
                let _ = reply.send(self.store.add_stock(&symbol, &name, initial_price));
            }
            Command::RemoveStock { symbol, reply } => {
                let _ = reply.send(self.store.remove_stock(&symbol));
            }
            Command::SelectStock { symbol, reply } => {
                let _ = reply.send(self.store.select_stock(&symbol));
            }
            Command::PriceHistory { symbol, reply } => {
                let _ = reply.send(Ok(self.store.get_stock_price_history(&symbol)));
            }
            Command::SaveState { reply } => {
                let _ = reply.send(self.store.save_state_to_storage());
            }
            Command::LoadState { reply } => {
                let _ = reply.send(self.store.load_state_from_storage());
            }
            Command::DismissError { reply } => {
                self.store.dismiss_error();
                let _ = reply.send(Ok(()));
            }
            // The loop intercepts shutdown before dispatch
            Command::Shutdown { reply } => {
                let _ = reply.send(self.store.snapshot());
            }
        }
    }
}

fn memory_interval(period_ms: u64) -> Interval {
    let period = Duration::from_millis(period_ms.max(1));
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn sleep_for(duration: Option<Duration>) {
    match duration {
        Some(duration) => time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

async fn next_memory_check(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Cloneable async facade over a running [`EngineService`]
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<TickerState>>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        rx.await.map_err(|_| EngineError::EngineStopped)?
    }

    pub async fn set_price(&self, symbol: &str, price: f64) -> Result<(), EngineError> {
        self.request(|reply| Command::SetPrice {
            symbol: symbol.to_string(),
            price,
            reply,
        })
        .await
    }

    pub async fn update_speed(&self, interval_ms: u64) -> Result<(), EngineError> {
        self.request(|reply| Command::UpdateSpeed { interval_ms, reply })
            .await
    }

    /// Returns the new `is_paused`
    pub async fn toggle_pause(&self) -> Result<bool, EngineError> {
        self.request(|reply| Command::TogglePause { reply }).await
    }

    /// Returns the sanitized symbol
    pub async fn add_stock(
        &self,
        symbol: &str,
        name: &str,
        initial_price: f64,
    ) -> Result<String, EngineError> {
        self.request(|reply| Command::AddStock {
            symbol: symbol.to_string(),
            name: name.to_string(),
            initial_price,
            reply,
        })
        .await
    }

    pub async fn remove_stock(&self, symbol: &str) -> Result<(), EngineError> {
        self.request(|reply| Command::RemoveStock {
            symbol: symbol.to_string(),
            reply,
        })
        .await
    }

    pub async fn select_stock(&self, symbol: &str) -> Result<(), EngineError> {
        self.request(|reply| Command::SelectStock {
            symbol: symbol.to_string(),
            reply,
        })
        .await
    }

    pub async fn get_stock_price_history(&self, symbol: &str) -> Result<Vec<PricePoint>, EngineError> {
        self.request(|reply| Command::PriceHistory {
            symbol: symbol.to_string(),
            reply,
        })
        .await
    }

    pub async fn save_state(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::SaveState { reply }).await
    }

    pub async fn load_state(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::LoadState { reply }).await
    }

    pub async fn dismiss_error(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::DismissError { reply }).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<TickerState> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<TickerState>> {
        self.snapshots.clone()
    }

    /// Stop the loop and return the final snapshot
    pub async fn shutdown(&self) -> Result<Arc<TickerState>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply: tx })
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        rx.await.map_err(|_| EngineError::EngineStopped)
    }
}
