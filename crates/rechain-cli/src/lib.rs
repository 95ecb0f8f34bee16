//! rechain CLI: pipelines, rule and workspace libraries, rule generation
pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod logging;

use std::io;

use anyhow::{Context, Result};
use rechain_store::FileStore;

use crate::cli::{Cli, Command};

/// Dispatch one parsed command, writing its output to stdout.
pub async fn run(cli: Cli) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Command::Apply(args) => commands::run_apply(args, &open_store(&cli)?, &mut out),
        Command::Rules(command) => commands::run_rules(command, &open_store(&cli)?, &mut out),
        Command::Workspace(command) => {
            commands::run_workspace(command, &open_store(&cli)?, &mut out)
        }
        Command::Generate(args) => commands::run_generate(args, &open_store(&cli)?, &mut out).await,
        Command::Status(args) => commands::run_status(args, &mut out).await,
    }
}

fn open_store(cli: &Cli) -> Result<FileStore> {
    FileStore::open(&cli.home).with_context(|| format!("open store at {}", cli.home.display()))
}
