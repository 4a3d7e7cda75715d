#![forbid(unsafe_code)]

//! manas-cert: conformance certification CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("manas-cert: {e}");
        std::process::exit(e.exit_code());
    }
}
