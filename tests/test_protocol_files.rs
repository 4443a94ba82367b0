//! Loading protocol files from disk and running what they describe.

mod common;

use std::io::Write;

use breathwork::config::{ConfigLimits, LoaderOptions, ProtocolLoader};
use breathwork::error::{BreathworkError, ConfigError, ExitCode};
use breathwork::exercise::{PhasedTimerEngine, RunStatus, TickEvent};
use breathwork::protocol::PhaseName;
use common::fixture_path;
use futures_util::StreamExt;

fn loader() -> ProtocolLoader {
    ProtocolLoader::new(LoaderOptions::default())
}

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn square_fixture_loads_with_aliases() {
    let result = loader().load(&fixture_path("square.yaml")).unwrap();
    let protocol = &result.plan.protocol;

    assert!(result.warnings.is_empty());
    assert_eq!(protocol.name(), "square-2");
    assert_eq!(protocol.title(), "Quick square");
    assert_eq!(result.plan.total_cycles, 2);
    assert_eq!(protocol.phase(3).unwrap().name, PhaseName::HoldAfterExhale);
    assert!(protocol.phases().iter().all(|p| p.duration_seconds == 2));
}

#[test]
fn zero_duration_fixture_reports_all_errors() {
    let err = loader().load(&fixture_path("zero-duration.yaml")).unwrap_err();
    let ConfigError::ValidationError { errors, .. } = &err else {
        panic!("expected validation error, got {err:?}");
    };
    let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&"protocol.cycles"));
    assert!(paths.contains(&"protocol.phases[1].duration"));
    assert!(paths.contains(&"protocol.phases[2].duration"));
    assert_eq!(
        BreathworkError::from(err).exit_code(),
        ExitCode::CONFIG_ERROR
    );
}

#[test]
fn empty_phase_list_is_rejected() {
    let err = loader().load(&fixture_path("no-phases.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));
}

#[test]
fn unknown_field_is_a_parse_error() {
    let err = loader().load(&fixture_path("unknown-field.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn long_session_only_warns() {
    let result = loader().load(&fixture_path("long-session.yaml")).unwrap();
    assert_eq!(result.warnings.len(), 2);
    assert_eq!(result.plan.total_cycles, 400);
}

#[test]
fn file_size_limit_is_enforced() {
    let file = write_temp(&format!(
        "# {}\nprotocol:\n  name: big\n  phases:\n    - phase: inhale\n      duration: 1\n",
        "x".repeat(512)
    ));
    let loader = ProtocolLoader::new(LoaderOptions {
        config_limits: ConfigLimits {
            max_file_size: 256,
            ..ConfigLimits::default()
        },
    });
    let err = loader.load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "file_size"));
}

#[test]
fn phase_limit_is_enforced() {
    let mut yaml = String::from("protocol:\n  name: many\n  phases:\n");
    for _ in 0..5 {
        yaml.push_str("    - phase: inhale\n      duration: 1\n");
    }
    let file = write_temp(&yaml);
    let loader = ProtocolLoader::new(LoaderOptions {
        config_limits: ConfigLimits {
            max_phases: 4,
            ..ConfigLimits::default()
        },
    });
    assert!(matches!(
        loader.load(file.path()),
        Err(ConfigError::ValidationError { .. })
    ));
}

#[test]
fn humantime_minutes_are_whole_seconds() {
    let file = write_temp(
        "protocol:\n  name: slow\n  phases:\n    - phase: inhale\n      duration: 1m\n    - phase: exhale\n      duration: 1m 30s\n",
    );
    let result = loader().load(file.path()).unwrap();
    let durations: Vec<u32> = result
        .plan
        .protocol
        .phases()
        .iter()
        .map(|p| p.duration_seconds)
        .collect();
    assert_eq!(durations, vec![60, 90]);
    assert_eq!(result.plan.total_cycles, 1);
}

#[tokio::test(start_paused = true)]
async fn loaded_file_runs_to_completion() {
    let plan = loader().load(&fixture_path("square.yaml")).unwrap().plan;
    let engine = PhasedTimerEngine::default();
    let mut handle = engine.start_plan(&plan).unwrap();
    let ticks: Vec<TickEvent> = engine.on_tick(&mut handle).unwrap().collect().await;

    assert_eq!(ticks.len(), 16);
    let last = ticks.last().unwrap();
    assert_eq!(last.status, RunStatus::Completed);
    assert_eq!((last.cycle_index, last.phase_index), (1, 3));
}
