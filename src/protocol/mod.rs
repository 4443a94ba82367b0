//! Breathing protocols
//!
//! A [`Protocol`] is the ordered list of phases making up one breathing
//! cycle. It is fixed configuration: built once (from the catalog or a
//! protocol file), frozen behind an `Arc`, and only ever read by the engine.
//!
//! # Architecture
//!
//! - [`PhaseName`] - the four breathing phases and their on-screen labels
//! - [`PhaseSpec`] - one phase with its duration in whole seconds
//! - [`Protocol`] - one cycle's worth of phases
//! - [`ExercisePlan`] - a protocol paired with the number of cycles to run
//! - [`catalog`] - presets embedded in the binary

pub mod catalog;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValidationIssue;

/// One of the four breathing phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseName {
    /// Breathe in.
    Inhale,
    /// Hold with full lungs.
    #[serde(alias = "hold-in")]
    HoldAfterInhale,
    /// Breathe out.
    Exhale,
    /// Hold with empty lungs.
    #[serde(alias = "hold-out")]
    HoldAfterExhale,
}

impl PhaseName {
    /// Returns the label shown to the person doing the exercise.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Inhale => "Breathe In",
            Self::HoldAfterInhale | Self::HoldAfterExhale => "Hold",
            Self::Exhale => "Breathe Out",
        }
    }

    /// Returns the kebab-case identifier used in protocol files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inhale => "inhale",
            Self::HoldAfterInhale => "hold-after-inhale",
            Self::Exhale => "exhale",
            Self::HoldAfterExhale => "hold-after-exhale",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable definition of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSpec {
    /// Which phase this is
    pub name: PhaseName,
    /// How long the phase lasts, in whole seconds (ticks)
    pub duration_seconds: u32,
}

impl PhaseSpec {
    /// Creates a phase lasting `duration_seconds` ticks.
    #[must_use]
    pub const fn new(name: PhaseName, duration_seconds: u32) -> Self {
        Self {
            name,
            duration_seconds,
        }
    }
}

/// Ordered sequence of phases forming one cycle.
///
/// Construction does not validate; [`Protocol::validate`] and the engine's
/// `start` do, so a malformed protocol is rejected before any countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    name: String,
    title: Option<String>,
    phases: Vec<PhaseSpec>,
}

impl Protocol {
    /// Creates a protocol from its phases.
    #[must_use]
    pub fn new(name: impl Into<String>, phases: Vec<PhaseSpec>) -> Self {
        Self {
            name: name.into(),
            title: None,
            phases,
        }
    }

    /// Sets the human-readable title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The 4-4-4-4 box-breathing cycle.
    #[must_use]
    pub fn box_breathing() -> Self {
        Self::new(
            "box",
            vec![
                PhaseSpec::new(PhaseName::Inhale, 4),
                PhaseSpec::new(PhaseName::HoldAfterInhale, 4),
                PhaseSpec::new(PhaseName::Exhale, 4),
                PhaseSpec::new(PhaseName::HoldAfterExhale, 4),
            ],
        )
        .with_title("Box Breathing")
    }

    /// Returns the protocol identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the title, falling back to the name.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Returns the phases of one cycle, in order.
    #[must_use]
    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    /// Returns the phase at `index`, if any.
    #[must_use]
    pub fn phase(&self, index: usize) -> Option<&PhaseSpec> {
        self.phases.get(index)
    }

    /// Number of phases per cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the protocol has no phases (and is therefore invalid).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Length of one cycle in seconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn cycle_seconds(&self) -> u64 {
        self.phases
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(u64::from(p.duration_seconds)))
    }

    /// Checks the structural preconditions for running this protocol.
    ///
    /// Returns every error found; an empty list means the protocol can run.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.phases.is_empty() {
            issues.push(ValidationIssue::error(
                "protocol.phases",
                "protocol must have at least one phase",
            ));
        }
        for (i, phase) in self.phases.iter().enumerate() {
            if phase.duration_seconds == 0 {
                issues.push(ValidationIssue::error(
                    format!("protocol.phases[{i}].duration"),
                    format!("{} must last at least 1 second", phase.name),
                ));
            }
        }
        issues
    }
}

/// A protocol paired with the number of cycles to run.
#[derive(Debug, Clone)]
pub struct ExercisePlan {
    /// Shared, read-only protocol
    pub protocol: Arc<Protocol>,
    /// Number of full cycles to run
    pub total_cycles: u32,
}

impl ExercisePlan {
    /// Creates a plan.
    #[must_use]
    pub const fn new(protocol: Arc<Protocol>, total_cycles: u32) -> Self {
        Self {
            protocol,
            total_cycles,
        }
    }

    /// Returns a copy of this plan with a different cycle count.
    #[must_use]
    pub fn with_cycles(&self, total_cycles: u32) -> Self {
        Self::new(Arc::clone(&self.protocol), total_cycles)
    }

    /// Number of ticks a run of this plan produces before it completes,
    /// saturating at `u64::MAX`.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        u64::from(self.total_cycles).saturating_mul(self.protocol.cycle_seconds())
    }

    /// Validates both the protocol and the cycle count.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = self.protocol.validate();
        if self.total_cycles == 0 {
            issues.push(ValidationIssue::error(
                "total_cycles",
                "an exercise must run at least one cycle",
            ));
        }
        issues
    }
}
