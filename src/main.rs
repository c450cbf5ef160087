//! Skillet - self-contained Python application packaging
//!
//! Builds a Python project and all of its dependencies into wheels, bundles
//! them with a virtualenv bootstrapper and a generated install script, and
//! archives the result so it installs on hosts with no network access and no
//! matching Python setup.

use clap::Parser;

mod archive;
mod builder;
mod cache;
mod cli;
mod commands;
mod describe;
mod error;
mod exec;
mod hooks;
mod ident;
mod installer;
mod log;
mod progress;
mod provision;
mod scratch;
mod template;
mod wheels;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build(args) => commands::build::run(args, cli.verbose),
        Commands::Cache(args) => commands::cache::run(args),
        Commands::Version => commands::version::run(),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
