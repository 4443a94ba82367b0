//! Shared integration-test helpers for running the `breathwork` binary and
//! building protocols in code.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use breathwork::exercise::TickEvent;
use breathwork::protocol::{PhaseName, PhaseSpec, Protocol};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout};

/// Default timeout for reading one line from the child.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tick interval that makes CLI runs finish in milliseconds.
pub const FAST_TICK: &str = "1ms";

const PHASE_ORDER: [PhaseName; 4] = [
    PhaseName::Inhale,
    PhaseName::HoldAfterInhale,
    PhaseName::Exhale,
    PhaseName::HoldAfterExhale,
];

/// Builds a protocol from durations, naming phases inhale, hold, exhale,
/// hold in turn.
#[must_use]
pub fn protocol(durations: &[u32]) -> Arc<Protocol> {
    let phases = durations
        .iter()
        .zip(PHASE_ORDER.iter().cycle())
        .map(|(d, n)| PhaseSpec::new(*n, *d))
        .collect();
    Arc::new(Protocol::new("test", phases))
}

/// Returns the path to a test fixture.
#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the binary to completion with `args`.
#[allow(clippy::missing_panics_doc)]
pub fn run_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_breathwork"))
        .args(args)
        .env_remove("BREATHWORK_PROTOCOL")
        .env_remove("BREATHWORK_CYCLES")
        .env_remove("BREATHWORK_TICK_INTERVAL")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run breathwork")
}

/// Parses every stdout line of a `--format json` run as a tick.
#[allow(clippy::missing_panics_doc)]
pub fn json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l).unwrap_or_else(|e| panic!("invalid JSON line: {e}\n{l}"))
        })
        .collect()
}

/// Extracts `(cycle, phase, remaining)` from a tick.
#[must_use]
pub const fn position(tick: &TickEvent) -> (u32, usize, u32) {
    (tick.cycle_index, tick.phase_index, tick.remaining_seconds)
}

/// A `breathwork run` child process whose stdout is read line by line.
///
/// The child is killed on drop.
pub struct RunningExercise {
    child: Child,
    reader: BufReader<ChildStdout>,
}

impl RunningExercise {
    /// Spawns `breathwork run` with `args` and JSON output.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn(args: &[&str]) -> Self {
        let mut child = tokio::process::Command::new(env!("CARGO_BIN_EXE_breathwork"))
            .arg("--quiet")
            .arg("run")
            .args(["--format", "json"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn breathwork");
        let stdout = child.stdout.take().expect("stdout not captured");
        Self {
            child,
            reader: BufReader::new(stdout),
        }
    }

    /// Returns the child's process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id().expect("child already reaped")
    }

    /// Reads one JSON tick; `None` at end of output.
    #[allow(clippy::missing_panics_doc)]
    pub async fn next_tick(&mut self) -> Option<Value> {
        let mut line = String::new();
        let n = tokio::time::timeout(DEFAULT_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a tick")
            .expect("read_line I/O error");
        if n == 0 {
            return None;
        }
        Some(serde_json::from_str(line.trim()).expect("tick line is not JSON"))
    }

    /// Sends `signal` (e.g. "INT", "TERM") to the child.
    #[allow(clippy::missing_panics_doc)]
    pub fn signal(&self, signal: &str) {
        let status = Command::new("kill")
            .arg(format!("-{signal}"))
            .arg(self.pid().to_string())
            .status()
            .expect("failed to run kill");
        assert!(status.success(), "kill -{signal} failed");
    }

    /// Waits for the child to exit and returns its exit code.
    #[allow(clippy::missing_panics_doc)]
    pub async fn wait(mut self) -> Option<i32> {
        tokio::time::timeout(DEFAULT_TIMEOUT, self.child.wait())
            .await
            .expect("timed out waiting for exit")
            .expect("wait failed")
            .code()
    }
}
