//! Binary entrypoint for `rechain`.
use clap::Parser;
use rechain_cli::cli::Cli;
use rechain_cli::logging::{init_logging, LogConfig};
use rechain_cli::run;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(&LogConfig::from_cli(&cli)) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    if let Err(error) = run(cli).await {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}
