//! Permutator command line
//!
//! Compiles every permutation of a shader's options and writes C headers
//! with the deduplicated binaries and a key-indexed lookup table.

use std::process::ExitCode;

use log::LevelFilter;
use permutator::{USAGE, app, cli};

fn main() -> ExitCode {
    let args = match cli::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("permutator: {e}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    if args.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    if args.disable_logs {
        env_logger::Builder::new().filter_level(LevelFilter::Error).init();
    } else {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("warn,permutator=info,permutator_core=info"),
        )
        .init();
    }

    match app::run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("permutator: {e:#}");
            ExitCode::FAILURE
        }
    }
}
