//! Guided exercise engine
//!
//! Runs one breathing protocol at a time, counting down each phase one tick
//! per second and stepping through phases and cycles until the plan
//! completes or the run is cancelled.
//!
//! # Architecture
//!
//! - [`state`] - `RunState` and the pure one-tick advance step
//! - `driver` - periodic task that turns the clock into ticks
//! - [`handle`] - `RunHandle` and the `TickStream` a caller observes
//! - [`engine`] - `PhasedTimerEngine`: start, supersede, cancel, shutdown

mod driver;
pub mod engine;
pub mod handle;
pub mod state;

pub use engine::{DEFAULT_TICK_INTERVAL, EngineConfig, PhasedTimerEngine};
pub use handle::{RunHandle, TickStream};
pub use state::{CancelReason, RunId, RunState, RunStatus, Step, TickEvent};
