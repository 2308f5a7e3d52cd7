use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

use zfs_stmf::cli::{self, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only command results
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("zfs-stmf: failed to install logger: {}", e);
    }

    debug!(command = ?cli.command, "Starting zfs-stmf");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli::run(cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zfs-stmf: {}", e);
            ExitCode::FAILURE
        }
    }
}
