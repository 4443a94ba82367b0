//! Structured event stream for `breathwork`.
//!
//! Discrete, typed run lifecycle events. Events are serialized as
//! newline-delimited JSON (JSONL) and include a monotonically increasing
//! sequence number for ordering guarantees.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::exercise::RunId;
use crate::protocol::PhaseName;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during an exercise.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A run has started ticking.
    RunStarted {
        /// When the run started.
        timestamp: DateTime<Utc>,
        /// Run identifier.
        run_id: RunId,
        /// Protocol name.
        protocol: String,
        /// Cycles to run.
        total_cycles: u32,
        /// Ticks the run will take if not cancelled.
        total_ticks: u64,
    },

    /// A phase boundary was crossed.
    PhaseEntered {
        /// When the phase began.
        timestamp: DateTime<Utc>,
        /// Run identifier.
        run_id: RunId,
        /// Zero-based cycle.
        cycle_index: u32,
        /// Zero-based phase within the cycle.
        phase_index: usize,
        /// Phase that was entered.
        phase: PhaseName,
    },

    /// The run finished every cycle.
    RunCompleted {
        /// When the last tick fired.
        timestamp: DateTime<Utc>,
        /// Run identifier.
        run_id: RunId,
        /// Ticks delivered.
        ticks: u64,
    },

    /// The run stopped early.
    RunCancelled {
        /// When the run was cancelled.
        timestamp: DateTime<Utc>,
        /// Run identifier.
        run_id: RunId,
        /// Running ticks delivered before the cancel.
        ticks: u64,
        /// Human-readable reason.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as a single JSON line, and flushes. Serialization or
/// I/O failures are dropped: a full disk must never stall an exercise.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    /// In-memory writer for capturing emitter output in tests.
    #[derive(Clone)]
    pub(crate) struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        pub(crate) fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        pub(crate) fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }

        pub(crate) fn lines(&self) -> Vec<serde_json::Value> {
            self.contents()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event::RunStarted {
            timestamp: DateTime::parse_from_rfc3339("2026-03-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            run_id: 1,
            protocol: "box".to_owned(),
            total_cycles: 5,
            total_ticks: 80,
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "RunStarted");
        assert_eq!(parsed["protocol"], "box");
    }

    #[test]
    fn emitter_writes_valid_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());

        let lines = tw.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "RunStarted");
        assert_eq!(lines[0]["total_ticks"], 80);
        assert_eq!(lines[0]["sequence"], 0);
    }

    #[test]
    fn emitter_increments_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());
        emitter.emit(Event::RunCompleted {
            timestamp: Utc::now(),
            run_id: 1,
            ticks: 80,
        });

        assert_eq!(emitter.event_count(), 2);

        let lines = tw.lines();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
    }

    #[test]
    fn phase_entered_uses_kebab_phase_name() {
        let event = Event::PhaseEntered {
            timestamp: Utc::now(),
            run_id: 3,
            cycle_index: 1,
            phase_index: 2,
            phase: PhaseName::HoldAfterExhale,
        };
        let parsed = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed["phase"], "hold-after-exhale");
    }

    #[test]
    fn noop_emitter_counts_but_discards() {
        let emitter = EventEmitter::noop();
        emitter.emit(sample_event());
        assert_eq!(emitter.event_count(), 1);
    }

    #[test]
    fn envelope_flattens_event_fields() {
        let envelope = EventEnvelope {
            sequence: 7,
            event: Event::RunCancelled {
                timestamp: Utc::now(),
                run_id: 2,
                ticks: 10,
                reason: "user requested".to_owned(),
            },
        };
        let parsed = serde_json::to_value(&envelope).unwrap();

        assert_eq!(parsed["sequence"], 7);
        assert_eq!(parsed["type"], "RunCancelled");
        assert_eq!(parsed["reason"], "user requested");
        assert!(
            parsed.get("event").is_none(),
            "event field should be flattened"
        );
    }
}
