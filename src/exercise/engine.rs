//! Phased timer engine
//!
//! The `PhasedTimerEngine` owns at most one running exercise. Starting a new
//! one supersedes the previous run: its tick source is stopped and its
//! stream closed before the new driver is spawned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{EngineError, ValidationIssue};
use crate::observability::events::EventEmitter;
use crate::protocol::{ExercisePlan, Protocol};

use super::driver;
use super::handle::{RunHandle, RunShared, TickStream};
use super::state::{CancelReason, RunId, RunStatus};

/// Default time between two ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Wall-clock length of one tick. Each tick still counts as one second
    /// of the protocol; shorter values only speed the exercise up.
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Creates a config with the given tick interval.
    #[must_use]
    pub const fn with_tick_interval(tick_interval: Duration) -> Self {
        Self { tick_interval }
    }
}

/// The current run and the task driving it.
struct ActiveRun {
    shared: Arc<RunShared>,
    driver: JoinHandle<()>,
}

impl ActiveRun {
    fn stop(self, reason: CancelReason) {
        self.shared.cancel(reason);
        self.driver.abort();
    }
}

/// Drives one timed exercise at a time.
///
/// Coordinates:
/// - Validation of the plan before any state changes
/// - Superseding the previous run on `start`
/// - One driver task per run, emitting one tick per interval
/// - Cancellation from the handle, the engine, or shutdown
pub struct PhasedTimerEngine {
    config: EngineConfig,
    active: Mutex<Option<ActiveRun>>,
    next_id: AtomicU64,
    emitter: Option<Arc<EventEmitter>>,
}

impl std::fmt::Debug for PhasedTimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhasedTimerEngine")
            .field("config", &self.config)
            .field("active_run", &self.active_run())
            .finish_non_exhaustive()
    }
}

impl Default for PhasedTimerEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PhasedTimerEngine {
    /// Creates an idle engine.
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            emitter: None,
        }
    }

    /// Attaches a lifecycle event emitter.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts `protocol` for `total_cycles` cycles.
    ///
    /// # Errors
    ///
    /// See [`start_plan`](Self::start_plan).
    pub fn start(
        &self,
        protocol: Arc<Protocol>,
        total_cycles: u32,
    ) -> Result<RunHandle, EngineError> {
        self.start_plan(&ExercisePlan::new(protocol, total_cycles))
    }

    /// Starts a plan, cancelling whatever run was active.
    ///
    /// The first tick arrives one tick interval after this call. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for an empty protocol, a zero-length
    /// phase or zero cycles, and `EngineError::Fault` outside a runtime. On
    /// error nothing changes: an active run keeps running.
    pub fn start_plan(&self, plan: &ExercisePlan) -> Result<RunHandle, EngineError> {
        let mut issues = plan.validate();
        if self.config.tick_interval.is_zero() {
            issues.push(ValidationIssue::error(
                "tick_interval",
                "tick interval must be greater than zero",
            ));
        }
        if !issues.is_empty() {
            return Err(EngineError::Validation(issues));
        }
        let runtime = Handle::try_current()
            .map_err(|e| EngineError::Fault(format!("no tokio runtime available: {e}")))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (shared, rx) = RunShared::new(id, plan.clone(), self.emitter.clone())?;

        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            debug!(
                previous = previous.shared.id(),
                next = id,
                "superseding active run"
            );
            previous.stop(CancelReason::Superseded);
        }

        // Lifecycle events for this run must precede its first tick.
        shared.announce();
        let driver = driver::spawn(&runtime, Arc::clone(&shared), self.config.tick_interval);
        *active = Some(ActiveRun {
            shared: Arc::clone(&shared),
            driver,
        });
        drop(active);

        Ok(RunHandle::new(shared, rx))
    }

    /// Takes the tick sequence of `handle`'s run.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidHandle` if the sequence was already
    /// taken; a sequence cannot be resumed, only a new `start` makes a new
    /// one.
    pub fn on_tick(&self, handle: &mut RunHandle) -> Result<TickStream, EngineError> {
        handle
            .take_ticks()
            .ok_or_else(|| EngineError::InvalidHandle {
                run_id: handle.id(),
            })
    }

    /// Cancels `handle`'s run.
    ///
    /// No-op for a run that already ended or was superseded. Returns `true`
    /// if this call stopped the run.
    pub fn cancel(&self, handle: &RunHandle) -> bool {
        let cancelled = handle.shared().cancel(CancelReason::UserRequested);

        let mut active = self.lock_active();
        if active
            .as_ref()
            .is_some_and(|run| run.shared.id() == handle.id())
        {
            if let Some(run) = active.take() {
                run.driver.abort();
            }
        }
        cancelled
    }

    /// Whether `handle`'s run is still ticking.
    #[must_use]
    pub fn is_active(&self, handle: &RunHandle) -> bool {
        handle.is_active()
    }

    /// Returns the id of the running exercise, if any.
    #[must_use]
    pub fn active_run(&self) -> Option<RunId> {
        self.lock_active()
            .as_ref()
            .filter(|run| run.shared.status() == RunStatus::Running)
            .map(|run| run.shared.id())
    }

    /// Returns the status of the most recent run, `Idle` if there is none.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.lock_active()
            .as_ref()
            .map_or(RunStatus::Idle, |run| run.shared.status())
    }

    /// Cancels the active run, if any.
    pub fn shutdown(&self) {
        if let Some(run) = self.lock_active().take() {
            run.stop(CancelReason::Shutdown);
        }
    }
}

impl Drop for PhasedTimerEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
