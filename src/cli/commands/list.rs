//! `list` command handler

use std::time::Duration;

use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::BreathworkError;
use crate::protocol::catalog;

/// List the built-in protocols.
///
/// # Errors
///
/// Returns a config error if an embedded protocol fails to load, or a JSON
/// error if output serialization fails.
pub fn run(args: &ListArgs) -> Result<(), BreathworkError> {
    let mut entries = Vec::new();
    for builtin in catalog::list_protocols() {
        let plan = catalog::load_builtin(builtin.name)?;
        entries.push((builtin, plan));
    }

    match args.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = entries
                .iter()
                .map(|(builtin, plan)| {
                    serde_json::json!({
                        "name": builtin.name,
                        "title": plan.protocol.title(),
                        "description": builtin.description,
                        "cycles": plan.total_cycles,
                        "phases": plan
                            .protocol
                            .phases()
                            .iter()
                            .map(|p| serde_json::json!({
                                "phase": p.name,
                                "duration_seconds": p.duration_seconds,
                            }))
                            .collect::<Vec<_>>(),
                        "total_seconds": plan.total_ticks(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Human => {
            println!("Built-in Protocols ({} available)\n", entries.len());
            for (builtin, plan) in &entries {
                let total = humantime::format_duration(Duration::from_secs(plan.total_ticks()));
                println!("  {:<16}{:<60}{total}", builtin.name, builtin.description);
            }
            println!();
            println!("Run a protocol: breathwork run --protocol <name>");
            println!("View YAML:      breathwork show <name>");
        }
    }

    Ok(())
}
