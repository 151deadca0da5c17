#![forbid(unsafe_code)]

//! lsh — Log Stats Helper CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("lsh: {e}");
        std::process::exit(1);
    }
}
