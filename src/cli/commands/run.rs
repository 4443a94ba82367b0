//! `run` command handler
//!
//! Starts one exercise and renders its ticks until it completes or the
//! process is asked to stop.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{OutputFormat, RunArgs};
use crate::cli::commands::show::unknown_protocol_message;
use crate::config::loader::{ConfigLimits, LoaderOptions, ProtocolLoader};
use crate::error::{BreathworkError, ConfigError, EngineError};
use crate::exercise::{CancelReason, EngineConfig, PhasedTimerEngine, RunStatus, TickEvent};
use crate::observability::{self, EventEmitter};
use crate::protocol::{ExercisePlan, catalog};

/// Protocol used when neither `--protocol` nor `--file` is given.
pub const DEFAULT_PROTOCOL: &str = "box";

/// Run a guided breathing exercise.
///
/// # Errors
///
/// Returns `BreathworkError::Interrupted` if `cancel` fires before the run
/// completes, a usage or config error if the protocol cannot be resolved,
/// and an engine error if the run faulted.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), BreathworkError> {
    if let Some(port) = args.metrics_port {
        observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let plan = resolve_plan(args)?;

    let mut engine = PhasedTimerEngine::new(EngineConfig::with_tick_interval(args.tick_interval));
    if let Some(path) = &args.events {
        engine = engine.with_emitter(Arc::new(EventEmitter::from_file(path)?));
    }

    let mut handle = engine.start_plan(&plan)?;
    let mut ticks = engine.on_tick(&mut handle)?;

    let mut out = std::io::stdout();
    let renderer = Renderer::new(args.format);
    renderer.header(&mut out, &plan)?;
    renderer.tick(&mut out, &handle.snapshot())?;

    let last = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled(), if handle.is_active() => {
                engine.cancel(&handle);
            }
            tick = ticks.next_tick() => match tick {
                Some(tick) => {
                    renderer.tick(&mut out, &tick)?;
                    if tick.is_terminal() {
                        break Some(tick);
                    }
                }
                None => break None,
            }
        }
    };
    renderer.footer(&mut out, last.as_ref())?;

    match last {
        Some(tick) if tick.status == RunStatus::Completed => Ok(()),
        Some(TickEvent {
            cancel_reason: Some(CancelReason::Fault(msg)),
            ..
        }) => Err(EngineError::Fault(msg).into()),
        Some(_) => Err(BreathworkError::Interrupted),
        None => Err(EngineError::Fault("tick stream ended without a terminal tick".to_string()).into()),
    }
}

/// Resolves the plan from `--file` or `--protocol`, then applies `--cycles`.
///
/// # Errors
///
/// Returns a usage error for an unknown preset or an over-limit cycle count,
/// and a config error if the protocol file fails to load.
pub fn resolve_plan(args: &RunArgs) -> Result<ExercisePlan, BreathworkError> {
    let limits = ConfigLimits::default();

    let plan = if let Some(path) = &args.file {
        tracing::info!(file = %path.display(), "loading protocol");
        let loader = ProtocolLoader::new(LoaderOptions {
            config_limits: limits.clone(),
        });
        let result = loader.load(path)?;
        for warning in &result.warnings {
            tracing::warn!(
                location = warning.location.as_deref().unwrap_or("<unknown>"),
                "{}",
                warning.message
            );
        }
        result.plan
    } else {
        let name = args.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
        match catalog::load_builtin(name) {
            Ok(plan) => plan,
            Err(ConfigError::UnknownProtocol { name }) => {
                return Err(BreathworkError::Usage(unknown_protocol_message(&name)));
            }
            Err(e) => return Err(e.into()),
        }
    };

    match args.cycles {
        Some(cycles) if cycles > limits.max_cycles => Err(BreathworkError::Usage(format!(
            "--cycles {cycles} exceeds the limit of {}",
            limits.max_cycles
        ))),
        Some(cycles) => Ok(plan.with_cycles(cycles)),
        None => Ok(plan),
    }
}

/// Writes ticks to stdout in the chosen format.
///
/// Human output draws the initial countdown and a closing line; JSON output
/// is exactly one `TickEvent` object per delivered tick.
#[derive(Debug, Clone, Copy)]
struct Renderer {
    format: OutputFormat,
}

impl Renderer {
    const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn header(self, out: &mut impl Write, plan: &ExercisePlan) -> std::io::Result<()> {
        if self.format == OutputFormat::Human {
            let total = humantime::format_duration(Duration::from_secs(plan.total_ticks()));
            writeln!(
                out,
                "{}: {} cycles ({total})",
                plan.protocol.title(),
                plan.total_cycles
            )?;
        }
        out.flush()
    }

    fn tick(self, out: &mut impl Write, tick: &TickEvent) -> Result<(), BreathworkError> {
        match self.format {
            OutputFormat::Human => {
                // Terminal ticks are summarized by the footer.
                if tick.is_terminal() {
                    return Ok(());
                }
                writeln!(out, "{}", format_tick(tick))?;
            }
            OutputFormat::Json => {
                if tick.tick == 0 && !tick.is_terminal() {
                    return Ok(());
                }
                writeln!(out, "{}", serde_json::to_string(tick)?)?;
            }
        }
        out.flush()?;
        Ok(())
    }

    fn footer(self, out: &mut impl Write, last: Option<&TickEvent>) -> std::io::Result<()> {
        if self.format == OutputFormat::Human {
            match last {
                Some(tick) if tick.status == RunStatus::Completed => {
                    writeln!(out, "Exercise complete. Well done.")?;
                }
                Some(tick) => {
                    let reason = tick
                        .cancel_reason
                        .as_ref()
                        .map_or_else(|| "cancelled".to_string(), ToString::to_string);
                    writeln!(out, "Exercise stopped ({reason}).")?;
                }
                None => {}
            }
        }
        out.flush()
    }
}

/// Formats one countdown line: `Cycle 2 of 5 · Breathe Out · 3`.
#[must_use]
pub fn format_tick(tick: &TickEvent) -> String {
    format!(
        "Cycle {} of {} · {} · {}",
        tick.cycle_index + 1,
        tick.total_cycles,
        tick.phase_label,
        tick.remaining_seconds
    )
}
