//! CLI module for the schemaplan tool.
//!
//! This module provides the command-line interface for checking schemas
//! and planning resource instances.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, StateCommands};
pub use output::OutputFormatter;
