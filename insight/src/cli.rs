//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};

/// Repo Insight CLI
///
/// Index a repository with the remote code-understanding service, ask it
/// questions, and turn its answers into a structured insight report.
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Repository access token forwarded to the remote services
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Branch to use instead of the configured default
    #[arg(long, short, global = true)]
    pub branch: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a repository for indexing
    Index {
        /// Repository as owner/name or owner/name@branch
        repository: String,
    },

    /// Show the indexing status of a repository
    Status {
        /// Repository as owner/name or owner/name@branch
        repository: String,

        /// Keep polling until indexing finishes
        #[arg(long)]
        wait: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a single question about an indexed repository
    Query {
        /// Repository as owner/name or owner/name@branch
        repository: String,

        /// Question to ask
        question: String,
    },

    /// Index if needed, run the prompt battery and print the insight report
    Analyze {
        /// Repository as owner/name or owner/name@branch
        repository: String,

        /// Resubmit for indexing even if the repository is already indexed
        #[arg(long)]
        refresh: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_flags() {
        let cli = Cli::parse_from([
            "insight",
            "analyze",
            "acme/widgets",
            "--refresh",
            "--json",
            "--github-token",
            "ghp_test",
        ]);

        assert_eq!(cli.github_token.as_deref(), Some("ghp_test"));
        match cli.command {
            Commands::Analyze {
                repository,
                refresh,
                json,
            } => {
                assert_eq!(repository, "acme/widgets");
                assert!(refresh);
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_query_takes_question() {
        let cli = Cli::parse_from(["insight", "query", "acme/widgets", "Where is main?", "-b", "dev"]);

        assert_eq!(cli.branch.as_deref(), Some("dev"));
        assert!(matches!(cli.command, Commands::Query { ref question, .. } if question == "Where is main?"));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
