use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{Cli, USAGE_ERROR};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // clap's own exit uses 2 for usage errors, which is the keyring code here.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { USAGE_ERROR } else { 0 });
        }
    };
    std::process::exit(commands::dispatch(cli));
}
