use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "deppr",
    about = "Turn dependency collector output into branches, commits, and pull requests",
    version,
    author
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    pub path: String,

    #[command(flatten)]
    pub run: RunArgs,

    /// Keep temporary files and print the commands being run
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file, relative to the project directory (defaults to deps.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Skip lockfile updates
    #[arg(long, global = true)]
    pub no_lockfile_updates: bool,

    /// Skip manifest updates
    #[arg(long, global = true)]
    pub no_manifest_updates: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect dependencies and list the updates that would be made
    Check,

    /// Apply updates to the working tree
    Update {
        /// Commit each update on its own branch, returning to the current branch afterwards
        #[arg(short, long)]
        branch: bool,
    },

    /// Push each update to its own branch and open a pull request
    Ci {
        /// Branch the pull requests target (defaults to the current branch)
        #[arg(long, value_name = "BRANCH")]
        base_branch: Option<String>,

        /// Pull request host: github, gitlab or test (detected from the remote when omitted)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ci_options() {
        let cli = Cli::parse_from([
            "deppr",
            "ci",
            "--base-branch",
            "develop",
            "--host",
            "gitlab",
            "--no-manifest-updates",
        ]);

        assert!(cli.run.no_manifest_updates);
        assert!(!cli.run.no_lockfile_updates);
        match cli.command {
            Commands::Ci { base_branch, host } => {
                assert_eq!(base_branch.as_deref(), Some("develop"));
                assert_eq!(host.as_deref(), Some("gitlab"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_options_default() {
        let cli = Cli::parse_from(["deppr", "update"]);
        assert_eq!(cli.path, ".");
        assert!(cli.run.config.is_none());
        assert!(!cli.debug);
        assert!(matches!(cli.command, Commands::Update { branch: false }));
    }
}
