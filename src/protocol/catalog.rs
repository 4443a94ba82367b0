//! Built-in breathing protocols
//!
//! Presets embedded in the binary at compile time, in the same YAML format
//! as user protocol files. Enables zero-configuration usage:
//! `breathwork run --protocol box`

use std::sync::LazyLock;

use crate::config::loader::{LoaderOptions, ProtocolLoader};
use crate::error::ConfigError;

use super::ExercisePlan;

/// A built-in protocol embedded in the binary.
pub struct BuiltinProtocol {
    /// Unique identifier (kebab-case, e.g., "box").
    pub name: &'static str,

    /// Short human-readable description.
    pub description: &'static str,

    /// Raw YAML content (embedded at compile time).
    pub yaml: &'static str,
}

/// Global registry of all built-in protocols, in display order.
static BUILTIN_PROTOCOLS: LazyLock<Vec<BuiltinProtocol>> = LazyLock::new(|| {
    vec![
        BuiltinProtocol {
            name: "box",
            description: "Inhale, hold, exhale, hold for 4 seconds each, 5 cycles",
            yaml: include_str!("../../protocols/box.yaml"),
        },
        BuiltinProtocol {
            name: "relaxing-478",
            description: "Inhale 4, hold 7, exhale 8, 4 cycles",
            yaml: include_str!("../../protocols/relaxing-478.yaml"),
        },
        BuiltinProtocol {
            name: "coherent",
            description: "Inhale 5, exhale 5, about six breaths a minute",
            yaml: include_str!("../../protocols/coherent.yaml"),
        },
    ]
});

/// Returns every built-in protocol.
#[must_use]
pub fn list_protocols() -> &'static [BuiltinProtocol] {
    &BUILTIN_PROTOCOLS
}

/// Returns the names of all built-in protocols.
#[must_use]
pub fn list_protocol_names() -> Vec<&'static str> {
    BUILTIN_PROTOCOLS.iter().map(|p| p.name).collect()
}

/// Looks up a built-in protocol by exact name.
#[must_use]
pub fn find_protocol(name: &str) -> Option<&'static BuiltinProtocol> {
    BUILTIN_PROTOCOLS.iter().find(|p| p.name == name)
}

/// Suggests the closest built-in name for a mistyped input.
///
/// Returns `None` when nothing is within edit distance 3.
#[must_use]
pub fn suggest_protocol(input: &str) -> Option<String> {
    BUILTIN_PROTOCOLS
        .iter()
        .map(|p| (p.name, strsim::damerau_levenshtein(input, p.name)))
        .filter(|(_, distance)| *distance <= 3)
        .min_by_key(|(_, distance)| *distance)
        .map(|(name, _)| name.to_string())
}

/// Parses and validates a built-in protocol into a runnable plan.
///
/// # Errors
///
/// Returns `ConfigError::UnknownProtocol` if no preset has this name, or a
/// parse/validation error if the embedded YAML is broken.
pub fn load_builtin(name: &str) -> Result<ExercisePlan, ConfigError> {
    let builtin = find_protocol(name).ok_or_else(|| ConfigError::UnknownProtocol {
        name: name.to_string(),
    })?;
    let loader = ProtocolLoader::new(LoaderOptions::default());
    let origin = format!("builtin:{}", builtin.name);
    Ok(loader.load_str(builtin.yaml, &origin)?.plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PhaseName;

    #[test]
    fn all_builtin_protocols_load() {
        for builtin in list_protocols() {
            let plan = load_builtin(builtin.name)
                .unwrap_or_else(|e| panic!("{} failed to load: {e}", builtin.name));
            assert_eq!(plan.protocol.name(), builtin.name);
            assert!(plan.validate().is_empty());
        }
    }

    #[test]
    fn box_preset_is_four_by_four_for_five_cycles() {
        let plan = load_builtin("box").unwrap();
        assert_eq!(plan.total_cycles, 5);
        assert_eq!(plan.total_ticks(), 80);
        let names: Vec<PhaseName> = plan.protocol.phases().iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec![
                PhaseName::Inhale,
                PhaseName::HoldAfterInhale,
                PhaseName::Exhale,
                PhaseName::HoldAfterExhale,
            ]
        );
        assert!(plan.protocol.phases().iter().all(|p| p.duration_seconds == 4));
    }

    #[test]
    fn builtin_names_are_unique() {
        let mut names = list_protocol_names();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn find_unknown_protocol() {
        assert!(find_protocol("square").is_none());
        assert!(matches!(
            load_builtin("square"),
            Err(ConfigError::UnknownProtocol { .. })
        ));
    }

    #[test]
    fn suggest_protocol_close() {
        assert_eq!(suggest_protocol("bxo").as_deref(), Some("box"));
        assert_eq!(suggest_protocol("coherant").as_deref(), Some("coherent"));
    }

    #[test]
    fn suggest_protocol_far() {
        assert!(suggest_protocol("progressive-muscle-relaxation").is_none());
    }
}
