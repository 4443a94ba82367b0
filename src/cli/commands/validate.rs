//! `validate` command handler

use std::path::Path;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::loader::{LoadResult, LoaderOptions, ProtocolLoader};
use crate::error::{BreathworkError, ConfigError, ValidationIssue};

/// Validate protocol files without running them.
///
/// Every file is checked even after a failure so one invocation reports all
/// problems. With `--strict`, warnings fail validation too.
///
/// # Errors
///
/// Returns the first file's error if any file is invalid.
pub fn run(args: &ValidateArgs) -> Result<(), BreathworkError> {
    let loader = ProtocolLoader::new(LoaderOptions::default());
    let mut first_error: Option<BreathworkError> = None;
    let mut reports = Vec::new();

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating protocol");
        let outcome = check(&loader, path, args.strict);

        match (&outcome, args.format) {
            (Ok(result), OutputFormat::Human) => {
                println!(
                    "ok    {}  ({}, {} cycles)",
                    path.display(),
                    result.plan.protocol.name(),
                    result.plan.total_cycles
                );
                for warning in &result.warnings {
                    println!("      warning: {}", warning.message);
                }
            }
            (Err(e), OutputFormat::Human) => {
                println!("fail  {}", path.display());
                println!("      {e}");
            }
            (Ok(result), OutputFormat::Json) => reports.push(serde_json::json!({
                "file": path.display().to_string(),
                "valid": true,
                "protocol": result.plan.protocol.name(),
                "cycles": result.plan.total_cycles,
                "warnings": result.warnings.iter().map(|w| &w.message).collect::<Vec<_>>(),
            })),
            (Err(e), OutputFormat::Json) => reports.push(serde_json::json!({
                "file": path.display().to_string(),
                "valid": false,
                "error": e.to_string(),
            })),
        }

        if let Err(e) = outcome {
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    first_error.map_or(Ok(()), Err)
}

fn check(loader: &ProtocolLoader, path: &Path, strict: bool) -> Result<LoadResult, BreathworkError> {
    let result = loader.load(path)?;
    if strict && !result.warnings.is_empty() {
        let errors = result
            .warnings
            .iter()
            .map(|w| {
                ValidationIssue::error(w.location.as_deref().unwrap_or("<unknown>"), &w.message)
            })
            .collect();
        return Err(ConfigError::ValidationError {
            path: path.display().to_string(),
            errors,
        }
        .into());
    }
    Ok(result)
}
