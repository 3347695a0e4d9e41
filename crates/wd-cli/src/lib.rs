//! Workday timer CLI library.
//!
//! This crate provides the CLI interface for the workday timer.

mod cli;
pub mod commands;
mod config;
mod tracker;

pub use cli::{Cli, Commands, Durations, OvertimeAction};
pub use config::Config;
pub use tracker::Tracker;
