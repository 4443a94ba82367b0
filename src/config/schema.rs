//! Protocol file schema
//!
//! Serde types mirroring the YAML layout of a protocol file. These are the
//! raw, unvalidated shapes; the validator turns them into a
//! [`Protocol`](crate::protocol::Protocol).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::PhaseName;

/// Cycle count used when a protocol file does not specify one.
pub const DEFAULT_CYCLES: u32 = 1;

/// Root of a protocol file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolFile {
    /// The protocol definition
    pub protocol: ProtocolConfig,
}

/// A protocol as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Kebab-case identifier
    pub name: String,

    /// Human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Number of cycles to run (defaults to [`DEFAULT_CYCLES`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles: Option<u32>,

    /// Phases of one cycle, in order
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

impl ProtocolConfig {
    /// Returns the configured cycle count or the default.
    #[must_use]
    pub fn cycles_or_default(&self) -> u32 {
        self.cycles.unwrap_or(DEFAULT_CYCLES)
    }
}

/// One phase as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseConfig {
    /// Which phase
    pub phase: PhaseName,

    /// How long it lasts
    pub duration: DurationValue,
}

/// A phase duration: either bare seconds or a humantime string.
///
/// ```yaml
/// duration: 4        # seconds
/// duration: 4s
/// duration: 1m 30s
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    /// Whole seconds
    Seconds(u64),
    /// A `humantime` duration such as `"4s"`
    Text(String),
}

impl DurationValue {
    /// Resolves the value to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message if the text is not a duration or is
    /// not a whole number of seconds.
    pub fn to_seconds(&self) -> Result<u64, String> {
        match self {
            Self::Seconds(n) => Ok(*n),
            Self::Text(raw) => {
                let trimmed = raw.trim();
                if let Ok(n) = trimmed.parse::<u64>() {
                    return Ok(n);
                }
                let duration = humantime::parse_duration(trimmed)
                    .map_err(|e| format!("invalid duration '{raw}': {e}"))?;
                whole_seconds(duration)
                    .ok_or_else(|| format!("duration '{raw}' is not a whole number of seconds"))
            }
        }
    }
}

fn whole_seconds(duration: Duration) -> Option<u64> {
    (duration.subsec_nanos() == 0).then(|| duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let yaml = r"
protocol:
  name: square-6
  title: Slow square
  cycles: 3
  phases:
    - phase: inhale
      duration: 6s
    - phase: hold-in
      duration: 6
";
        let file: ProtocolFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.protocol.name, "square-6");
        assert_eq!(file.protocol.cycles_or_default(), 3);
        assert_eq!(file.protocol.phases.len(), 2);
        assert_eq!(file.protocol.phases[1].phase, PhaseName::HoldAfterInhale);
        assert_eq!(file.protocol.phases[1].duration, DurationValue::Seconds(6));
    }

    #[test]
    fn test_cycles_default() {
        let yaml = "protocol:\n  name: x\n  phases: []\n";
        let file: ProtocolFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.protocol.cycles_or_default(), DEFAULT_CYCLES);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "protocol:\n  name: x\n  tempo: fast\n";
        assert!(serde_yaml::from_str::<ProtocolFile>(yaml).is_err());
    }

    #[test]
    fn test_unknown_phase_rejected() {
        let yaml = "protocol:\n  name: x\n  phases:\n    - phase: sigh\n      duration: 2\n";
        assert!(serde_yaml::from_str::<ProtocolFile>(yaml).is_err());
    }

    #[test]
    fn test_duration_seconds() {
        assert_eq!(DurationValue::Seconds(4).to_seconds(), Ok(4));
        assert_eq!(DurationValue::Text(" 7 ".to_string()).to_seconds(), Ok(7));
    }

    #[test]
    fn test_duration_humantime() {
        assert_eq!(DurationValue::Text("4s".to_string()).to_seconds(), Ok(4));
        assert_eq!(DurationValue::Text("1m 30s".to_string()).to_seconds(), Ok(90));
    }

    #[test]
    fn test_duration_fractional_rejected() {
        let err = DurationValue::Text("1500ms".to_string())
            .to_seconds()
            .unwrap_err();
        assert!(err.contains("whole number"));
    }

    #[test]
    fn test_duration_garbage_rejected() {
        assert!(DurationValue::Text("forever".to_string()).to_seconds().is_err());
    }
}
