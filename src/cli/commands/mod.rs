//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod list;
pub mod run;
pub mod show;
pub mod validate;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::error::BreathworkError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` is triggered by the process signal handler; only `run` waits on
/// it.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), BreathworkError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::List(args) => list::run(&args),
        Commands::Show(args) => show::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
