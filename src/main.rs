//! Archscan CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use archscan::cli::{self, Cli, Commands, EXIT_ERROR};

/// Logs go to stderr so JSON on stdout stays machine-readable. `RUST_LOG`
/// overrides the `-v` level.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match &cli.command {
        Commands::Scan(args) => cli::run_scan(args),
        Commands::List(args) => cli::run_list(args),
        Commands::Generate(args) => cli::run_generate(args),
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
