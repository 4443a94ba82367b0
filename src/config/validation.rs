//! Protocol file validation
//!
//! Validation collects ALL issues (doesn't stop at the first) so a person
//! editing a protocol file sees every problem at once.

use crate::config::loader::ConfigLimits;
use crate::config::schema::ProtocolConfig;
use crate::error::{Severity, ValidationIssue};
use crate::protocol::{PhaseSpec, Protocol};

/// Exercises longer than this get a warning.
const LONG_EXERCISE_SECS: u64 = 60 * 60;

/// Result of protocol validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,

    /// The validated protocol, present only when there are no errors.
    pub protocol: Option<Protocol>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Protocol validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a protocol definition and, if sound, builds the protocol.
    pub fn validate(&mut self, config: &ProtocolConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_name(&config.name);
        self.validate_cycles(config.cycles_or_default(), limits);
        let phases = self.validate_phases(config, limits);

        if self.errors.is_empty() {
            let cycle_secs: u64 = phases.iter().map(|p| u64::from(p.duration_seconds)).sum();
            let total = cycle_secs.saturating_mul(u64::from(config.cycles_or_default()));
            if total > LONG_EXERCISE_SECS {
                self.add_warning(
                    "protocol",
                    &format!(
                        "exercise runs for {}, longer than one hour",
                        humantime::format_duration(std::time::Duration::from_secs(total))
                    ),
                );
            }
        }

        let protocol = self.errors.is_empty().then(|| {
            let protocol = Protocol::new(config.name.clone(), phases);
            match &config.title {
                Some(title) => protocol.with_title(title.clone()),
                None => protocol,
            }
        });

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
            protocol,
        }
    }

    fn validate_name(&mut self, name: &str) {
        if name.trim().is_empty() {
            self.add_error("protocol.name", "protocol name cannot be empty");
            return;
        }
        if !is_kebab_case(name) {
            self.add_warning(
                "protocol.name",
                &format!("protocol name '{name}' is not kebab-case"),
            );
        }
    }

    fn validate_cycles(&mut self, cycles: u32, limits: &ConfigLimits) {
        if cycles == 0 {
            self.add_error("protocol.cycles", "an exercise must run at least one cycle");
        } else if cycles > limits.max_cycles {
            self.add_error(
                "protocol.cycles",
                &format!("{cycles} cycles exceeds the limit of {}", limits.max_cycles),
            );
        }
    }

    fn validate_phases(&mut self, config: &ProtocolConfig, limits: &ConfigLimits) -> Vec<PhaseSpec> {
        if config.phases.is_empty() {
            self.add_error("protocol.phases", "protocol must have at least one phase");
            return Vec::new();
        }
        if config.phases.len() > limits.max_phases {
            self.add_error(
                "protocol.phases",
                &format!(
                    "{} phases exceeds the limit of {}",
                    config.phases.len(),
                    limits.max_phases
                ),
            );
        }

        let mut specs = Vec::with_capacity(config.phases.len());
        for (i, phase) in config.phases.iter().enumerate() {
            let path = format!("protocol.phases[{i}].duration");
            match phase.duration.to_seconds() {
                Ok(0) => self.add_error(&path, "phase must last at least 1 second"),
                Ok(secs) => match u32::try_from(secs) {
                    Ok(secs) => specs.push(PhaseSpec::new(phase.phase, secs)),
                    Err(_) => self.add_error(&path, &format!("{secs} seconds is too long")),
                },
                Err(message) => self.add_error(&path, &message),
            }
        }
        specs
    }

    /// Adds an error to the collection.
    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    /// Adds a warning to the collection.
    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

fn is_kebab_case(name: &str) -> bool {
    !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DurationValue, PhaseConfig};
    use crate::protocol::PhaseName;

    fn limits() -> ConfigLimits {
        ConfigLimits {
            max_phases: 8,
            max_cycles: 100,
            max_file_size: 64 * 1024,
        }
    }

    fn phase(name: PhaseName, secs: u64) -> PhaseConfig {
        PhaseConfig {
            phase: name,
            duration: DurationValue::Seconds(secs),
        }
    }

    fn config(phases: Vec<PhaseConfig>, cycles: Option<u32>) -> ProtocolConfig {
        ProtocolConfig {
            name: "test-protocol".to_string(),
            title: None,
            cycles,
            phases,
        }
    }

    #[test]
    fn test_valid_protocol_builds() {
        let cfg = config(
            vec![phase(PhaseName::Inhale, 4), phase(PhaseName::Exhale, 6)],
            Some(3),
        );
        let result = Validator::new().validate(&cfg, &limits());
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
        let protocol = result.protocol.unwrap();
        assert_eq!(protocol.cycle_seconds(), 10);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut cfg = config(
            vec![phase(PhaseName::Inhale, 0), phase(PhaseName::Exhale, 0)],
            Some(0),
        );
        cfg.name = String::new();
        let result = Validator::new().validate(&cfg, &limits());
        assert!(result.has_errors());
        assert_eq!(result.errors.len(), 4);
        assert!(result.protocol.is_none());
    }

    #[test]
    fn test_empty_phases() {
        let result = Validator::new().validate(&config(vec![], None), &limits());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "protocol.phases");
    }

    #[test]
    fn test_phase_limit() {
        let phases = (0..9).map(|_| phase(PhaseName::Inhale, 1)).collect();
        let result = Validator::new().validate(&config(phases, None), &limits());
        assert!(result.errors.iter().any(|e| e.message.contains("limit")));
    }

    #[test]
    fn test_cycle_limit() {
        let cfg = config(vec![phase(PhaseName::Inhale, 1)], Some(101));
        let result = Validator::new().validate(&cfg, &limits());
        assert_eq!(result.errors[0].path, "protocol.cycles");
    }

    #[test]
    fn test_bad_duration_text() {
        let cfg = config(
            vec![PhaseConfig {
                phase: PhaseName::Inhale,
                duration: DurationValue::Text("soon".to_string()),
            }],
            None,
        );
        let result = Validator::new().validate(&cfg, &limits());
        assert_eq!(result.errors[0].path, "protocol.phases[0].duration");
    }

    #[test]
    fn test_long_exercise_warning() {
        let cfg = config(vec![phase(PhaseName::Inhale, 60)], Some(61));
        let result = Validator::new().validate(&cfg, &limits());
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_non_kebab_name_warning() {
        let mut cfg = config(vec![phase(PhaseName::Inhale, 4)], None);
        cfg.name = "My Protocol".to_string();
        let result = Validator::new().validate(&cfg, &limits());
        assert!(result.is_valid());
        assert_eq!(result.warnings[0].path, "protocol.name");
    }

    #[test]
    fn test_title_carried_over() {
        let mut cfg = config(vec![phase(PhaseName::Inhale, 4)], None);
        cfg.title = Some("Just Breathe".to_string());
        let result = Validator::new().validate(&cfg, &limits());
        assert_eq!(result.protocol.unwrap().title(), "Just Breathe");
    }

    #[test]
    fn test_kebab_case() {
        assert!(is_kebab_case("box"));
        assert!(is_kebab_case("relaxing-478"));
        assert!(!is_kebab_case("Box"));
        assert!(!is_kebab_case("-box"));
        assert!(!is_kebab_case("a--b"));
    }
}
