//! `breathwork` - guided breathing exercises in the terminal

use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use breathwork::cli::args::Cli;
use breathwork::cli::commands;
use breathwork::error::{BreathworkError, ExitCode};
use breathwork::observability::{LogFormat, init_logging};

/// Set when the exercise was stopped by SIGTERM rather than Ctrl+C.
static TERMINATED: AtomicBool = AtomicBool::new(false);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(LogFormat::for_output(cli.output_format()), cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();

    // First signal stops the exercise cleanly, a second one forces exit
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            () = terminate_signal() => TERMINATED.store(true, Ordering::SeqCst),
        }
        signal_cancel.cancel();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
            () = terminate_signal() => std::process::exit(ExitCode::TERMINATED),
        }
    });

    let result = commands::dispatch(cli, cancel).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(BreathworkError::Interrupted) if TERMINATED.load(Ordering::SeqCst) => {
            std::process::exit(ExitCode::TERMINATED);
        }
        Err(BreathworkError::Interrupted) => std::process::exit(ExitCode::INTERRUPTED),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
