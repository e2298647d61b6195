mod agents;
mod cli;
mod config;
mod error;
mod host;
mod output;
mod schema;
mod updates;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use colored::Colorize;
use std::process;
use updates::UpdateScope;
use workflow::RunOptions;

fn run_options(args: RunArgs) -> RunOptions {
    RunOptions {
        config_path: args.config,
        scope: UpdateScope {
            lockfiles: !args.no_lockfile_updates,
            manifests: !args.no_manifest_updates,
        },
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        unsafe {
            std::env::set_var(output::DEBUG_ENV, "1");
        }
    }

    let options = run_options(cli.run);
    let result = match cli.command {
        Commands::Check => workflow::execute_check(&cli.path, &options),
        Commands::Update { branch } => workflow::execute_update(&cli.path, &options, branch),
        Commands::Ci { base_branch, host } => {
            workflow::execute_ci(&cli.path, &options, base_branch, host.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
