// src/bin/pli.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use pli::cli::{Cli, dispatcher, prompter::PromptError};

/// The main entry point of the `pli` application.
/// It sets up logging, parses arguments, dispatches to the command handler,
/// and performs centralized error handling.
fn main() {
    let cli = Cli::parse();
    init_logger(cli.log_level.as_deref());

    if let Err(e) = run_cli(cli) {
        // A prompt cancelled with Ctrl+C exits silently, like a shell would.
        if let Some(PromptError::Interrupted) = e.downcast_ref::<PromptError>() {
            std::process::exit(130);
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// `--log-level` wins over `RUST_LOG`; the default is `warn`.
fn init_logger(level: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.init();
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);
    dispatcher::dispatch(cli.args)
}
