//! CLI subcommand implementations.

pub mod plays;
pub mod scenarios;
pub mod shell;
