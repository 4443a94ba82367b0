//! `show` command handler

use std::fmt::Write as _;

use crate::cli::args::ShowArgs;
use crate::error::BreathworkError;
use crate::protocol::catalog;

/// Builds the usage message for a protocol name that is not in the catalog.
///
/// Includes a "did you mean" suggestion when one is close enough, followed
/// by the list of available presets.
#[must_use]
pub fn unknown_protocol_message(name: &str) -> String {
    let mut message = format!("Unknown protocol '{name}'");

    if let Some(suggestion) = catalog::suggest_protocol(name) {
        let _ = write!(message, "\n\nDid you mean '{suggestion}'?");
    }

    message.push_str("\n\nAvailable protocols:");
    for builtin in catalog::list_protocols() {
        let _ = write!(message, "\n  {:<16}{}", builtin.name, builtin.description);
    }

    message.push_str("\n\nUse 'breathwork list' for full details.");
    message
}

/// Print the YAML of a built-in protocol.
///
/// Prints raw YAML to stdout, suitable for piping into a file and editing.
///
/// # Errors
///
/// Returns a usage error if the protocol name is not found.
pub fn run(args: &ShowArgs) -> Result<(), BreathworkError> {
    let builtin = catalog::find_protocol(&args.name)
        .ok_or_else(|| BreathworkError::Usage(unknown_protocol_message(&args.name)))?;

    print!("{}", builtin.yaml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_protocol_message_suggests_close_name() {
        let message = unknown_protocol_message("bx");
        assert!(message.contains("Did you mean 'box'?"));
        assert!(message.contains("relaxing-478"));
    }

    #[test]
    fn test_unknown_protocol_message_without_suggestion() {
        let message = unknown_protocol_message("completely-unrelated-name");
        assert!(!message.contains("Did you mean"));
        assert!(message.contains("Available protocols:"));
    }

    #[test]
    fn test_show_unknown_is_usage_error() {
        let err = run(&ShowArgs {
            name: "nope-nope-nope".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, BreathworkError::Usage(_)));
    }
}
