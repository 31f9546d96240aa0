use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::agents::domain::CoordinationMode;

/// Consilium - answer a query with a coordinated team of LLM agents
#[derive(Parser, Debug, Clone)]
#[command(name = "consilium", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "CONSILIUM_CONFIG", default_value = "consilium.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Coordinate one query and print the primary answer
    Ask(AskArgs),

    /// Show which agents a query would use, without invoking any
    Select(SelectArgs),

    /// List registered agents
    Agents,

    /// Interactive session; reloads on config changes
    Chat {
        /// Coordination mode (defaults to coordination.default_mode)
        #[arg(short, long)]
        mode: Option<CoordinationMode>,

        /// Product scope passed to knowledge retrieval
        #[arg(long, default_value = "default")]
        scope: String,
    },
}

/// Agent selection overrides shared by `ask` and `select`
#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// The query
    pub query: String,

    /// Coordination mode (defaults to coordination.default_mode)
    #[arg(short, long)]
    pub mode: Option<CoordinationMode>,

    /// Explicit primary agent id
    #[arg(long)]
    pub primary: Option<String>,

    /// Explicit supporting agent ids, comma separated
    #[arg(long, value_delimiter = ',')]
    pub supporting: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    #[command(flatten)]
    pub selection: SelectArgs,

    /// Product scope passed to knowledge retrieval
    #[arg(long, default_value = "default")]
    pub scope: String,

    /// Wiki page or ticket reference (repeatable)
    #[arg(long = "reference")]
    pub references: Vec<String>,

    /// Overall deadline for the call
    #[arg(long)]
    pub timeout_secs: Option<f64>,

    /// Print the full response, trace included, as JSON
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the answer
    #[arg(long)]
    pub metrics: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["consilium", "agents"]);
        assert_eq!(cli.config, PathBuf::from("consilium.toml"));
        assert!(matches!(cli.command, Command::Agents));
    }

    #[test]
    fn test_ask_with_args() {
        let cli = Cli::parse_from([
            "consilium",
            "ask",
            "Draft a PRD and publish it to Confluence",
            "--mode",
            "enhanced",
            "--primary",
            "document",
            "--supporting",
            "knowledge,integration",
            "--scope",
            "payments",
            "--reference",
            "wiki:123",
            "--reference",
            "ticket:PAY-7",
            "--timeout-secs",
            "12.5",
            "--json",
            "--config",
            "custom.toml",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        let Command::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.selection.mode, Some(CoordinationMode::EnhancedCollaborative));
        assert_eq!(args.selection.primary.as_deref(), Some("document"));
        assert_eq!(args.selection.supporting, vec!["knowledge", "integration"]);
        assert_eq!(args.scope, "payments");
        assert_eq!(args.references, vec!["wiki:123", "ticket:PAY-7"]);
        assert_eq!(args.timeout_secs, Some(12.5));
        assert!(args.json);
        assert!(!args.metrics);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["consilium", "select", "q", "--mode", "round-robin"]).is_err());
    }
}
