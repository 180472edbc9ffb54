//! src/main.rs
use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use rawbench::{logging, parse_args, run, usage, Invocation, UsageError};

fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().collect();
    let argv0 = args
        .first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rawbench".to_string());

    let config = match parse_args(args) {
        Ok(Invocation::Help) => {
            eprint!("{}", usage(&argv0));
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Run(config)) => config,
        Err(UsageError::MissingDevice) => {
            eprint!("{}", usage(&argv0));
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{argv0}: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.verbose());
    log::debug!("{config:?}");

    match run(&config, &mut io::stdout(), &mut io::stderr()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{argv0}: {e}");
            ExitCode::FAILURE
        }
    }
}
