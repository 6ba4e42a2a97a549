//! Ticker engine
//!
//! - `store`: the aggregate root and every caller operation
//! - `scheduler`: Running/Paused state machine and tick deadlines
//! - `price_model`: how a tick perturbs prices
//! - `service`: tokio event loop and the async [`EngineHandle`]

pub mod price_model;
pub mod scheduler;
pub mod service;
pub mod store;

pub use price_model::{PriceModel, RandomWalk};
pub use scheduler::{Scheduler, SchedulerState};
pub use service::{EngineHandle, EngineService};
pub use store::{TickerStore, LOAD_STATE_OP, SAVE_STATE_OP};
