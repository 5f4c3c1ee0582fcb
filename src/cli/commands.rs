//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Schemaplan - schema-driven resource planning.
#[derive(Parser, Debug)]
#[command(name = "schemaplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the tool configuration file.
    #[arg(short, long, global = true, env = "SCHEMAPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text", env = "SCHEMAPLAN_OUTPUT")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a schema for internal consistency.
    Validate {
        /// Schema document (YAML or JSON).
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Print the type implied by a schema.
    ImpliedType {
        /// Schema document (YAML or JSON).
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Coerce a value document to conform to a schema.
    Coerce {
        /// Schema document (YAML or JSON).
        #[arg(short, long)]
        schema: PathBuf,

        /// Value document.
        #[arg(long)]
        value: PathBuf,
    },

    /// Compute the proposed new object from configuration and prior state.
    Propose {
        /// Schema document (YAML or JSON).
        #[arg(short, long)]
        schema: PathBuf,

        /// Configuration value document.
        #[arg(long)]
        config_value: PathBuf,

        /// Prior state value document; absent means the object is new.
        #[arg(long)]
        prior: Option<PathBuf>,
    },

    /// Plan a resource instance against recorded state.
    Plan {
        /// Schema document (YAML or JSON).
        #[arg(short, long)]
        schema: PathBuf,

        /// Configuration value document; absent plans a destroy.
        #[arg(long)]
        config_value: Option<PathBuf>,

        /// Resource instance address.
        #[arg(short, long)]
        resource: String,

        /// Where to write the plan file.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Apply a saved plan.
    Apply {
        /// Schema document (YAML or JSON).
        #[arg(short, long)]
        schema: PathBuf,

        /// Plan file; defaults to the configured plan output.
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Resource instance address the plan must be for.
        #[arg(short, long)]
        resource: Option<String>,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Print a schema as a provider protocol message.
    Wire {
        /// Schema document (YAML or JSON).
        #[arg(short, long)]
        schema: PathBuf,

        /// Schema version carried in the message.
        #[arg(long, default_value = "0")]
        schema_version: i64,
    },

    /// Manage recorded state.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },
}

/// State management subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// List recorded resource instances.
    List,

    /// Show one recorded resource instance.
    Show {
        /// Resource instance address.
        resource: String,
    },

    /// Remove a resource instance from state without destroying it.
    Rm {
        /// Resource instance address.
        resource: String,
    },

    /// Forcefully remove the state lock.
    Unlock,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan() {
        let cli = Cli::try_parse_from([
            "schemaplan",
            "--output",
            "json",
            "plan",
            "--schema",
            "schema.yaml",
            "--config-value",
            "web.json",
            "--resource",
            "res.web",
        ])
        .expect("parse");

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Plan {
                resource, out, ..
            } => {
                assert_eq!(resource, "res.web");
                assert!(out.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_state_rm() {
        let cli = Cli::try_parse_from(["schemaplan", "state", "rm", "res.web"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::State {
                command: StateCommands::Rm { .. }
            }
        ));
    }
}
