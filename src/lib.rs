//! `breathwork` - guided breathing exercises
//!
//! A phased timer engine that counts a breathing protocol down one tick per
//! second, through its phases and cycles, with start, supersede and cancel
//! semantics that never leak or duplicate a timer.

pub mod cli;
pub mod config;
pub mod error;
pub mod exercise;
pub mod observability;
pub mod protocol;
