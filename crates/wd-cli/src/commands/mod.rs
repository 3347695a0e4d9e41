//! CLI subcommand implementations.

pub mod control;
pub mod discard;
pub mod history;
pub mod settings;
pub mod status;
pub mod util;
pub mod watch;
