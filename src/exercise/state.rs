//! Run state and the phase-advance step
//!
//! [`RunState`] is the single mutable entity of an exercise. It is advanced
//! one tick at a time by [`RunState::advance`], a pure function of the
//! accumulated state: no clock is ever sampled here, so a run of `C` cycles
//! over a protocol of `S` seconds is exactly `C * S` calls long.

use std::sync::Arc;

use serde::Serialize;

use crate::error::EngineError;
use crate::protocol::{ExercisePlan, PhaseName, PhaseSpec, Protocol};

/// Identifier of one run, unique per engine.
pub type RunId = u64;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No exercise is active.
    Idle,
    /// Ticking.
    Running,
    /// Every cycle ran to the end.
    Completed,
    /// Stopped early.
    Cancelled,
}

impl RunStatus {
    /// Whether no further ticks can follow.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Why a run was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The person asked to stop.
    UserRequested,
    /// A new exercise was started over this one.
    Superseded,
    /// The engine was shut down.
    Shutdown,
    /// The tick driver hit an internal fault.
    Fault(String),
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserRequested => f.write_str("user requested"),
            Self::Superseded => f.write_str("superseded by a new exercise"),
            Self::Shutdown => f.write_str("engine shut down"),
            Self::Fault(msg) => write!(f, "fault: {msg}"),
        }
    }
}

/// Read-only snapshot of a run, delivered once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickEvent {
    /// Run this tick belongs to
    pub run_id: RunId,
    /// 1-based ordinal of the tick within the run (0 before the first tick)
    pub tick: u64,
    /// 0-based cycle
    pub cycle_index: u32,
    /// 0-based phase within the cycle
    pub phase_index: usize,
    /// Current phase
    pub phase_name: PhaseName,
    /// Label to show for the current phase
    pub phase_label: &'static str,
    /// Seconds left in the current phase
    pub remaining_seconds: u32,
    /// Number of cycles in the run
    pub total_cycles: u32,
    /// Status after this tick
    pub status: RunStatus,
    /// Set on the terminal tick of a cancelled run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<CancelReason>,
}

impl TickEvent {
    /// Whether this is the last tick of its run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// What a single [`RunState::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Same phase, one second less.
    Counting,
    /// Crossed into the next phase of the same cycle.
    PhaseEntered,
    /// Wrapped around into the first phase of the next cycle.
    CycleStarted,
    /// The last phase of the last cycle ran out.
    Completed,
}

/// Mutable state of one exercise run.
///
/// Invariants while `Running`: `cycle_index < total_cycles`,
/// `phase_index < protocol.len()`, and
/// `1 <= remaining_seconds <= current phase duration`. A terminal state keeps
/// the position it stopped at.
#[derive(Debug, Clone)]
pub struct RunState {
    protocol: Arc<Protocol>,
    total_cycles: u32,
    cycle_index: u32,
    phase_index: usize,
    remaining_seconds: u32,
    status: RunStatus,
    ticks: u64,
    cancel_reason: Option<CancelReason>,
}

impl RunState {
    /// Creates a running state at the start of the first phase.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` if the protocol is empty, has a
    /// zero-length phase, or the plan has zero cycles.
    pub fn new(plan: &ExercisePlan) -> Result<Self, EngineError> {
        let issues = plan.validate();
        if !issues.is_empty() {
            return Err(EngineError::Validation(issues));
        }
        let first = plan
            .protocol
            .phase(0)
            .ok_or_else(|| EngineError::Fault("validated protocol has no phases".to_string()))?;

        Ok(Self {
            protocol: Arc::clone(&plan.protocol),
            total_cycles: plan.total_cycles,
            cycle_index: 0,
            phase_index: 0,
            remaining_seconds: first.duration_seconds,
            status: RunStatus::Running,
            ticks: 0,
            cancel_reason: None,
        })
    }

    /// Returns the number of cycles in the run.
    #[must_use]
    pub const fn total_cycles(&self) -> u32 {
        self.total_cycles
    }

    /// Returns the 0-based cycle index.
    #[must_use]
    pub const fn cycle_index(&self) -> u32 {
        self.cycle_index
    }

    /// Returns the 0-based phase index.
    #[must_use]
    pub const fn phase_index(&self) -> usize {
        self.phase_index
    }

    /// Returns the seconds left in the current phase.
    #[must_use]
    pub const fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// Returns the run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns the number of ticks processed so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns the cancellation reason, if cancelled.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        self.cancel_reason.as_ref()
    }

    /// Whether the run is still ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Returns the current phase.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Fault` if the phase index is out of range.
    pub fn current_phase(&self) -> Result<&PhaseSpec, EngineError> {
        self.protocol.phase(self.phase_index).ok_or_else(|| {
            EngineError::Fault(format!(
                "phase index {} out of range for {} phases",
                self.phase_index,
                self.protocol.len()
            ))
        })
    }

    /// Advances the run by exactly one second.
    ///
    /// 1. Decrement the remaining seconds.
    /// 2. Still time left: stay in the phase.
    /// 3. Otherwise move to the next phase, wrapping to the next cycle, and
    ///    complete once the last cycle's last phase has run out. The
    ///    completed state keeps the final position with zero remaining.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Fault` if called on a run that is not running or
    /// whose position is inconsistent. The state is left untouched.
    pub fn advance(&mut self) -> Result<Step, EngineError> {
        if !self.is_running() {
            return Err(EngineError::Fault(format!(
                "advance called on a {:?} run",
                self.status
            )));
        }
        self.current_phase()?;
        let remaining = self.remaining_seconds.checked_sub(1).ok_or_else(|| {
            EngineError::Fault("running phase has no seconds left".to_string())
        })?;

        self.ticks += 1;
        self.remaining_seconds = remaining;
        if remaining > 0 {
            return Ok(Step::Counting);
        }

        let next_phase = self.phase_index + 1;
        if let Some(next) = self.protocol.phase(next_phase) {
            self.phase_index = next_phase;
            self.remaining_seconds = next.duration_seconds;
            return Ok(Step::PhaseEntered);
        }

        let next_cycle = self.cycle_index + 1;
        if next_cycle < self.total_cycles {
            let first = self.protocol.phase(0).ok_or_else(|| {
                EngineError::Fault("protocol lost its first phase".to_string())
            })?;
            self.phase_index = 0;
            self.cycle_index = next_cycle;
            self.remaining_seconds = first.duration_seconds;
            return Ok(Step::CycleStarted);
        }

        self.status = RunStatus::Completed;
        Ok(Step::Completed)
    }

    /// Moves a running state to `Cancelled`.
    ///
    /// Returns `false` (and changes nothing) if the run already ended.
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = RunStatus::Cancelled;
        self.cancel_reason = Some(reason);
        true
    }

    /// Builds the snapshot observers see for the current position.
    #[must_use]
    pub fn snapshot(&self, run_id: RunId) -> TickEvent {
        // Position is always in range; fall back to the first phase rather
        // than fail while reporting.
        let phase_name = self
            .protocol
            .phase(self.phase_index)
            .or_else(|| self.protocol.phase(0))
            .map_or(PhaseName::Inhale, |p| p.name);

        TickEvent {
            run_id,
            tick: self.ticks,
            cycle_index: self.cycle_index,
            phase_index: self.phase_index,
            phase_name,
            phase_label: phase_name.label(),
            remaining_seconds: self.remaining_seconds,
            total_cycles: self.total_cycles,
            status: self.status,
            cancel_reason: self.cancel_reason.clone(),
        }
    }
}
