//! EMBPM CLI entry point
//!
//! Parses arguments, sets up logging, runs the command and exits with the code it
//! returns. Errors that escape a command are shown with suggestions and exit 1.

use clap::Parser;
use embpm_cli::cli;
use embpm_cli::core::user_friendly_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if cli.plain() {
        colored::control::set_override(false);
    }

    // RUST_LOG wins over the verbosity flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let code = match cli.execute().await {
        Ok(code) => code,
        Err(e) => {
            user_friendly_error(e).display();
            1
        }
    };
    std::process::exit(code);
}
