//! Run handles and tick streams
//!
//! A run's state is shared between the tick driver task and the caller's
//! [`RunHandle`]. Every transition and every send happens under one lock,
//! and a terminal transition drops the channel sender, so once `cancel`
//! returns no further tick of that run can be observed.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::EngineError;
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::protocol::ExercisePlan;

use super::state::{CancelReason, RunId, RunState, RunStatus, Step, TickEvent};

/// Mutable half of a run, guarded by [`RunShared::cell`].
#[derive(Debug)]
struct RunCell {
    state: RunState,
    /// `None` once the run reached a terminal status.
    tx: Option<mpsc::UnboundedSender<TickEvent>>,
}

impl RunCell {
    fn send(&self, event: TickEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}

/// State shared by the engine, the driver task and the handle.
#[derive(Debug)]
pub(crate) struct RunShared {
    id: RunId,
    plan: ExercisePlan,
    cell: Mutex<RunCell>,
    token: CancellationToken,
    emitter: Option<Arc<EventEmitter>>,
}

impl RunShared {
    /// Creates the shared state of a fresh run and its tick receiver.
    pub(crate) fn new(
        id: RunId,
        plan: ExercisePlan,
        emitter: Option<Arc<EventEmitter>>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<TickEvent>), EngineError> {
        let state = RunState::new(&plan)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Self {
            id,
            plan,
            cell: Mutex::new(RunCell {
                state,
                tx: Some(tx),
            }),
            token: CancellationToken::new(),
            emitter,
        });
        Ok((shared, rx))
    }

    pub(crate) const fn id(&self) -> RunId {
        self.id
    }

    pub(crate) const fn plan(&self) -> &ExercisePlan {
        &self.plan
    }

    pub(crate) const fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn lock(&self) -> MutexGuard<'_, RunCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        if let Some(emitter) = &self.emitter {
            emitter.emit(event);
        }
    }

    pub(crate) fn status(&self) -> RunStatus {
        self.lock().state.status()
    }

    pub(crate) fn snapshot(&self) -> TickEvent {
        self.lock().state.snapshot(self.id)
    }

    /// Records the start of the run: log line, metrics and lifecycle events.
    pub(crate) fn announce(&self) {
        let protocol = self.plan.protocol.name();
        info!(
            run_id = self.id,
            protocol,
            total_cycles = self.plan.total_cycles,
            "exercise started"
        );
        metrics::record_run_started(protocol);
        self.emit(Event::RunStarted {
            timestamp: Utc::now(),
            run_id: self.id,
            protocol: protocol.to_string(),
            total_cycles: self.plan.total_cycles,
            total_ticks: self.plan.total_ticks(),
        });

        let first = self.snapshot();
        metrics::record_phase_entered(first.phase_name);
        self.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            run_id: self.id,
            cycle_index: first.cycle_index,
            phase_index: first.phase_index,
            phase: first.phase_name,
        });
    }

    /// Advances the run by one tick and delivers the resulting event.
    ///
    /// Returns `false` once the run no longer ticks, telling the driver to
    /// stop.
    pub(crate) fn tick(&self) -> bool {
        let mut cell = self.lock();
        if !cell.state.is_running() {
            return false;
        }

        let advanced = cell.state.advance();
        let step = match advanced {
            Ok(step) => step,
            Err(e) => {
                drop(cell);
                warn!(run_id = self.id, error = %e, "tick driver fault, cancelling run");
                self.cancel(CancelReason::Fault(e.to_string()));
                return false;
            }
        };

        let event = cell.state.snapshot(self.id);
        trace!(
            run_id = self.id,
            tick = event.tick,
            cycle = event.cycle_index,
            phase = %event.phase_name,
            remaining = event.remaining_seconds,
            "tick"
        );
        metrics::record_tick();

        match step {
            Step::Counting => {
                cell.send(event);
                true
            }
            Step::PhaseEntered | Step::CycleStarted => {
                debug!(
                    run_id = self.id,
                    cycle = event.cycle_index,
                    phase = %event.phase_name,
                    "phase entered"
                );
                metrics::record_phase_entered(event.phase_name);
                self.emit(Event::PhaseEntered {
                    timestamp: Utc::now(),
                    run_id: self.id,
                    cycle_index: event.cycle_index,
                    phase_index: event.phase_index,
                    phase: event.phase_name,
                });
                cell.send(event);
                true
            }
            Step::Completed => {
                let ticks = event.tick;
                cell.send(event);
                cell.tx = None;
                self.token.cancel();
                drop(cell);

                info!(run_id = self.id, ticks, "exercise completed");
                metrics::record_run_finished("completed");
                self.emit(Event::RunCompleted {
                    timestamp: Utc::now(),
                    run_id: self.id,
                    ticks,
                });
                false
            }
        }
    }

    /// Cancels the run if it is still running.
    ///
    /// Sends the terminal `Cancelled` tick, closes the tick stream and stops
    /// the driver before the lock is released. Returns `false` when the run
    /// had already ended.
    pub(crate) fn cancel(&self, reason: CancelReason) -> bool {
        let mut cell = self.lock();
        if !cell.state.cancel(reason.clone()) {
            return false;
        }
        let event = cell.state.snapshot(self.id);
        let ticks = event.tick;
        cell.send(event);
        cell.tx = None;
        self.token.cancel();
        drop(cell);

        info!(run_id = self.id, ticks, %reason, "exercise cancelled");
        metrics::record_run_finished("cancelled");
        self.emit(Event::RunCancelled {
            timestamp: Utc::now(),
            run_id: self.id,
            ticks,
            reason: reason.to_string(),
        });
        true
    }
}

/// Caller's handle on one run.
///
/// The handle stays valid after the run ends; it then reports the terminal
/// status and cancelling it is a no-op.
pub struct RunHandle {
    shared: Arc<RunShared>,
    ticks: Option<TickStream>,
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("id", &self.shared.id())
            .field("status", &self.shared.status())
            .field("ticks_taken", &self.ticks.is_none())
            .finish()
    }
}

impl RunHandle {
    pub(crate) fn new(shared: Arc<RunShared>, rx: mpsc::UnboundedReceiver<TickEvent>) -> Self {
        Self {
            shared,
            ticks: Some(TickStream::new(rx)),
        }
    }

    pub(crate) const fn shared(&self) -> &Arc<RunShared> {
        &self.shared
    }

    /// Returns the run identifier.
    #[must_use]
    pub fn id(&self) -> RunId {
        self.shared.id()
    }

    /// Returns the plan this run executes.
    #[must_use]
    pub fn plan(&self) -> &ExercisePlan {
        self.shared.plan()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.shared.status()
    }

    /// Whether the run is still ticking.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status() == RunStatus::Running
    }

    /// Returns the current position. Before the first tick this is tick 0
    /// at the full duration of the first phase.
    #[must_use]
    pub fn snapshot(&self) -> TickEvent {
        self.shared.snapshot()
    }

    /// Cancels the run at the person's request.
    ///
    /// Safe to call any number of times; returns `true` only for the call
    /// that actually stopped the run.
    pub fn cancel(&self) -> bool {
        self.shared.cancel(CancelReason::UserRequested)
    }

    /// Takes the tick sequence of this run. Only the first call returns it.
    pub const fn take_ticks(&mut self) -> Option<TickStream> {
        self.ticks.take()
    }
}

/// Finite stream of [`TickEvent`]s for one run.
///
/// Ends right after the terminal (`Completed` or `Cancelled`) tick.
#[derive(Debug)]
pub struct TickStream {
    inner: UnboundedReceiverStream<TickEvent>,
}

impl TickStream {
    fn new(rx: mpsc::UnboundedReceiver<TickEvent>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Waits for the next tick; `None` once the run has ended.
    pub async fn next_tick(&mut self) -> Option<TickEvent> {
        self.inner.next().await
    }
}

impl Stream for TickStream {
    type Item = TickEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
