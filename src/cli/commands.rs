//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bbrec - Reconcile declared Brightbox resources.
#[derive(Parser, Debug)]
#[command(name = "bbrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the manifest file.
    #[arg(short, long, global = true, env = "BBREC_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the manifest without calling the API.
    Validate,

    /// Create, update or delete resources until they match the manifest.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Re-read every tracked resource and record drift.
    Refresh,

    /// Delete every tracked resource.
    Destroy {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the persisted state.
    Show {
        /// Print sensitive attributes instead of masking them.
        #[arg(long)]
        reveal: bool,
    },
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

    #[test]
    fn test_parse_apply_with_globals() {
        let cli = Cli::try_parse_from(["bbrec", "apply", "--yes", "-m", "infra.yaml", "--output", "json"])
            .unwrap();

        assert!(matches!(cli.command, Commands::Apply { yes: true }));
        assert_eq!(cli.manifest, Some(PathBuf::from("infra.yaml")));
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["bbrec", "plan"]).is_err());
    }
}
