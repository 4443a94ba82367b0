//! Command-line interface
//!
//! Argument parsing and command handlers for the `breathwork` binary.

pub mod args;
pub mod commands;
