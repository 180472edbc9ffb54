use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{ArgAction, ArgGroup, Parser};

use crate::config::{Config, Operation};
use crate::error::UsageError;
use crate::{rule, DEFAULT_BUFFER_SIZE, DEFAULT_OFFSET, PROGRAM_TITLE};

/// Raw command line. Single-character POSIX flags only; clap's own help
/// and version handling are switched off so `-h` stays ours.
#[derive(Parser, Debug)]
#[command(
    name = "rawbench",
    disable_help_flag = true,
    disable_version_flag = true,
    group(ArgGroup::new("operation").args(["read", "write", "info"]).multiple(false))
)]
pub struct Cli {
    #[arg(short = 'r')]
    pub read: bool,
    #[arg(short = 'w')]
    pub write: bool,
    #[arg(short = 'i')]
    pub info: bool,
    #[arg(short = 'd', value_name = "dev_name")]
    pub device: Option<PathBuf>,
    #[arg(short = 'h')]
    pub help: bool,
    #[arg(short = 'z')]
    pub write_zero: bool,
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(short = 'b', value_name = "buf_size", allow_negative_numbers = true)]
    pub buffer_size: Option<i64>,
    #[arg(short = 'c', value_name = "count", allow_negative_numbers = true)]
    pub count: Option<i64>,
    #[arg(short = 'o', value_name = "offset", allow_negative_numbers = true)]
    pub offset: Option<i64>,
    #[arg(short = 's')]
    pub seek_back: bool,
    #[arg(short = 'y')]
    pub sync: bool,
}

impl Cli {
    /// The selected operation; clap's group guarantees at most one flag.
    pub fn operation(&self) -> Operation {
        if self.read {
            Operation::Read
        } else if self.write {
            Operation::Write
        } else {
            Operation::Info
        }
    }
}

/// Outcome of argument parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `-h` was given; print usage and exit successfully.
    Help,
    Run(Config),
}

/// Parse a full argument list (including argv[0]) into an [`Invocation`].
///
/// `-h` short-circuits every other check, even when the rest of the
/// command line is malformed.
pub fn parse_args<I, T>(args: I) -> Result<Invocation, UsageError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if help_requested(&args) {
        return Ok(Invocation::Help);
    }
    let cli = Cli::try_parse_from(&args).map_err(|err| usage_error(&err))?;
    Config::try_from(cli).map(Invocation::Run)
}

/// Short options that consume a value, attached (`-b4096`) or as the next
/// argument.
const VALUE_FLAGS: [char; 4] = ['d', 'b', 'c', 'o'];

/// Look for `h` in any short-option cluster the way getopt would see it,
/// before clap gets a chance to reject anything else on the line.
fn help_requested(args: &[OsString]) -> bool {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let arg = arg.to_string_lossy();
        if arg == "--" {
            break;
        }
        let Some(cluster) = arg.strip_prefix('-').filter(|c| !c.is_empty()) else {
            continue;
        };
        let mut chars = cluster.chars();
        while let Some(flag) = chars.next() {
            if flag == 'h' {
                return true;
            }
            if VALUE_FLAGS.contains(&flag) {
                if chars.as_str().is_empty() {
                    iter.next();
                }
                break;
            }
        }
    }
    false
}

/// Translate clap's error into the tool's own vocabulary.
fn usage_error(err: &clap::Error) -> UsageError {
    let invalid = err
        .get(ContextKind::InvalidArg)
        .and_then(context_string)
        .map(|s| flag_name(&s));
    match (err.kind(), invalid) {
        (ErrorKind::ArgumentConflict, Some(flag)) => {
            let other = err
                .get(ContextKind::PriorArg)
                .and_then(context_string)
                .map(|s| flag_name(&s))
                .unwrap_or_else(|| flag.clone());
            if other == flag {
                UsageError::Duplicate { flag }
            } else {
                UsageError::Conflict { flag, other }
            }
        }
        (ErrorKind::InvalidValue | ErrorKind::ValueValidation, Some(flag)) => {
            match err.get(ContextKind::InvalidValue).and_then(context_string) {
                Some(value) if !value.is_empty() => UsageError::InvalidNumber { flag, value },
                _ => UsageError::MissingValue { flag },
            }
        }
        _ => UsageError::Unrecognized(first_line(&err.to_string())),
    }
}

fn context_string(value: &ContextValue) -> Option<String> {
    match value {
        ContextValue::String(s) => Some(s.clone()),
        ContextValue::Strings(v) => v.first().cloned(),
        _ => None,
    }
}

/// `-b <buf_size>` -> `-b`
fn flag_name(display: &str) -> String {
    display
        .split_whitespace()
        .next()
        .unwrap_or(display)
        .to_string()
}

fn first_line(msg: &str) -> String {
    let line = msg.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}

/// Full usage banner, written to stderr by the binary.
pub fn usage(argv0: &str) -> String {
    let rule = rule();
    let mut text = format!("{rule}\n{PROGRAM_TITLE}\n{rule}\n");
    text.push_str(&format!(
        "Usage: {argv0} < -r | -w | -i > < -d dev_name > [ -hysv[v] ] [ -b buf_size ] [ -c count ] [ -o offset ]\n"
    ));
    text.push_str("       -r | -w | -i     Read from, write to or print info of the device. (default is -i)\n");
    text.push_str("       -d dev_name      Specify block device to operate on.\n");
    text.push_str("                        !!WARNING!! Be careful when using -w, as the device will be overwritten.\n");
    text.push_str("       -h               Print this help message and quit.\n");
    text.push_str("       -v               Increase verbose level (may be used multiple times).\n");
    text.push_str(&format!(
        "       -b buf_size      Specify different buffer size (in bytes, default={DEFAULT_BUFFER_SIZE}).\n"
    ));
    text.push_str("       -c count         Repeat the operation <count> times (default=1).\n");
    text.push_str("       -s               Seek back to offset before next count, averaging results.\n");
    text.push_str("       -y               Open device with O_SYNC (see open(2) man page).\n");
    text.push_str(&format!(
        "       -o offset        Starts to operate on device at <offset> (default={DEFAULT_OFFSET}).\n"
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Invocation, UsageError> {
        let mut argv = vec!["rawbench"];
        argv.extend_from_slice(args);
        parse_args(argv)
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn each_operation_flag_selects_its_mode() {
        for (flag, op) in [("-r", Operation::Read), ("-w", Operation::Write), ("-i", Operation::Info)] {
            match parse(&[flag, "-d", "dev"]).unwrap() {
                Invocation::Run(cfg) => assert_eq!(cfg.operation(), op),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn two_operation_flags_conflict() {
        for pair in [["-r", "-w"], ["-w", "-i"], ["-i", "-r"], ["-w", "-r"]] {
            let err = parse(&[pair[0], pair[1], "-d", "dev"]).unwrap_err();
            assert!(matches!(err, UsageError::Conflict { .. }), "{pair:?}: {err:?}");
        }
        let err = parse(&["-rw", "-d", "dev"]).unwrap_err();
        assert!(matches!(err, UsageError::Conflict { .. }), "{err:?}");
    }

    #[test]
    fn repeated_flags_are_rejected() {
        for flag in ["-r", "-s", "-y", "-z"] {
            let err = parse(&["-w", flag, flag, "-d", "dev"]).unwrap_err();
            assert!(matches!(err, UsageError::Duplicate { .. } | UsageError::Conflict { .. }), "{flag}: {err:?}");
        }
        let err = parse(&["-r", "-d", "a", "-d", "b"]).unwrap_err();
        assert_eq!(err, UsageError::Duplicate { flag: "-d".into() });
        let err = parse(&["-r", "-d", "a", "-b", "512", "-b", "1024"]).unwrap_err();
        assert_eq!(err, UsageError::Duplicate { flag: "-b".into() });
    }

    #[test]
    fn verbose_accumulates() {
        match parse(&["-v", "-v", "-vvv", "-d", "dev"]).unwrap() {
            Invocation::Run(cfg) => assert_eq!(cfg.verbose(), 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let err = parse(&["-r", "-d", "dev", "-b", "lots"]).unwrap_err();
        assert_eq!(
            err,
            UsageError::InvalidNumber { flag: "-b".into(), value: "lots".into() }
        );
    }

    #[test]
    fn option_without_value_is_rejected() {
        assert_eq!(parse(&["-r", "-d"]), Err(UsageError::MissingValue { flag: "-d".into() }));
    }

    #[test]
    fn help_short_circuits_everything() {
        assert_eq!(parse(&["-h"]), Ok(Invocation::Help));
        assert_eq!(parse(&["-r", "-w", "-h"]), Ok(Invocation::Help));
        assert_eq!(parse(&["-h", "-b", "0"]), Ok(Invocation::Help));
        assert_eq!(parse(&["-r", "-z", "-h"]), Ok(Invocation::Help));
        assert_eq!(parse(&["-r", "-r", "-h"]), Ok(Invocation::Help));
        assert_eq!(parse(&["-b", "lots", "-h"]), Ok(Invocation::Help));
        assert_eq!(parse(&["-q", "-h"]), Ok(Invocation::Help));
        assert_eq!(parse(&["-rvh", "-d", "dev"]), Ok(Invocation::Help));
    }

    #[test]
    fn option_values_are_not_mistaken_for_help() {
        for args in [&["-r", "-d", "h"][..], &["-r", "-dh"], &["-r", "-vd", "h"]] {
            match parse(args) {
                Ok(Invocation::Run(cfg)) => assert!(cfg.device().ends_with("h"), "{args:?}"),
                other => panic!("{args:?}: unexpected {other:?}"),
            }
        }
        assert_ne!(parse(&["-r", "-d", "dev", "--", "-h"]), Ok(Invocation::Help));
    }

    #[test]
    fn missing_device_is_a_usage_error() {
        assert_eq!(parse(&["-r"]), Err(UsageError::MissingDevice));
        assert_eq!(parse(&[]), Err(UsageError::MissingDevice));
    }

    #[test]
    fn usage_is_framed_by_title_length_rules() {
        let text = usage("rawbench");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0].len(), PROGRAM_TITLE.len());
        assert!(lines[0].chars().all(|c| c == '-'));
        assert_eq!(lines[1], PROGRAM_TITLE);
        assert_eq!(lines[2], lines[0]);
        assert!(lines[3].starts_with("Usage: rawbench "));
        assert!(text.contains("default=1048576"));
    }
}
