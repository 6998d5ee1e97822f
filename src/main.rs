mod cli;
mod commands;
mod methodology;
mod model;
mod report;
mod scoring;
mod store;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Phases(args) => commands::phases::run(args),
        Commands::Template(args) => commands::template::run(args),
        Commands::Score(args) => commands::score::run(args),
        Commands::Save(args) => commands::save::run(args),
        Commands::Projects(args) => commands::snapshots::run_projects(args),
        Commands::Show(args) => commands::snapshots::run_show(args),
        Commands::History(args) => commands::snapshots::run_history(args),
        Commands::Report(args) => commands::report::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
