use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::error::UsageError;
use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_COUNT, DEFAULT_OFFSET};

/// What the engine does with the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    Read,
    Write,
    /// Probe the device and print its geometry, no timed I/O.
    #[default]
    Info,
}

impl Operation {
    /// The timed transfer this operation performs, if any.
    pub fn transfer(self) -> Option<Transfer> {
        match self {
            Operation::Read => Some(Transfer::Read),
            Operation::Write => Some(Transfer::Write),
            Operation::Info => None,
        }
    }
}

/// Direction of the timed I/O call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Read,
    Write,
}

impl Transfer {
    pub fn as_str(self) -> &'static str {
        match self {
            Transfer::Read => "read",
            Transfer::Write => "write",
        }
    }
}

/// A validated run description. Built once from the command line and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    operation: Operation,
    device: PathBuf,
    buffer_size: usize,
    count: u64,
    offset: u64,
    seek_back: bool,
    write_zero: bool,
    use_sync: bool,
    verbose: u8,
}

impl Config {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Re-seek to `offset` before every iteration and report the average.
    pub fn seek_back(&self) -> bool {
        self.seek_back
    }

    /// Zero-filled write buffer. Zeros are the only pattern written.
    pub fn write_zero(&self) -> bool {
        self.write_zero
    }

    /// Open the device with `O_SYNC`.
    pub fn use_sync(&self) -> bool {
        self.use_sync
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }
}

impl TryFrom<Cli> for Config {
    type Error = UsageError;

    /// Range checks run in the order the flags are documented, then the
    /// cross-flag rule for `-z`, then defaults, then the device check.
    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let buffer_size = match cli.buffer_size {
            Some(b) if b < 1 => return Err(UsageError::BufferSize(b)),
            Some(b) => usize::try_from(b)
                .ok()
                .filter(|b| *b <= isize::MAX as usize)
                .ok_or(UsageError::BufferSize(b))?,
            None => DEFAULT_BUFFER_SIZE,
        };
        let count = match cli.count {
            Some(c) if c < 1 => return Err(UsageError::Count(c)),
            Some(c) => c as u64,
            None => DEFAULT_COUNT,
        };
        let offset = match cli.offset {
            Some(o) if o < 0 => return Err(UsageError::Offset(o)),
            Some(o) => o as u64,
            None => DEFAULT_OFFSET,
        };

        let operation = cli.operation();
        if cli.write_zero && operation != Operation::Write {
            return Err(UsageError::WriteZeroWithoutWrite);
        }

        let device = cli.device.ok_or(UsageError::MissingDevice)?;

        Ok(Config {
            operation,
            device,
            buffer_size,
            count,
            offset,
            seek_back: cli.seek_back,
            // Zero-fill is both the default and the only supported pattern.
            write_zero: true,
            use_sync: cli.sync,
            verbose: cli.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{parse_args, Invocation};

    fn config(args: &[&str]) -> Result<Config, UsageError> {
        let mut argv = vec!["rawbench"];
        argv.extend_from_slice(args);
        match parse_args(argv) {
            Ok(Invocation::Run(cfg)) => Ok(cfg),
            Ok(Invocation::Help) => panic!("unexpected help request"),
            Err(e) => Err(e),
        }
    }

    #[test]
    fn defaults_apply_to_unset_fields() {
        let cfg = config(&["-d", "/dev/null"]).unwrap();
        assert_eq!(cfg.operation(), Operation::Info);
        assert_eq!(cfg.device(), Path::new("/dev/null"));
        assert_eq!(cfg.buffer_size(), 1024 * 1024);
        assert_eq!(cfg.count(), 1);
        assert_eq!(cfg.offset(), 0);
        assert!(!cfg.seek_back());
        assert!(!cfg.use_sync());
        assert!(cfg.write_zero());
        assert_eq!(cfg.verbose(), 0);
    }

    #[test]
    fn every_field_is_taken_from_flags() {
        let cfg = config(&[
            "-w", "-z", "-d", "disk.img", "-b", "4096", "-c", "10", "-o", "8192", "-s", "-y",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cfg.operation(), Operation::Write);
        assert_eq!(cfg.buffer_size(), 4096);
        assert_eq!(cfg.count(), 10);
        assert_eq!(cfg.offset(), 8192);
        assert!(cfg.seek_back());
        assert!(cfg.use_sync());
        assert_eq!(cfg.verbose(), 2);
    }

    #[test]
    fn non_positive_buffer_size_is_rejected() {
        assert_eq!(config(&["-r", "-d", "x", "-b", "0"]), Err(UsageError::BufferSize(0)));
        assert_eq!(config(&["-r", "-d", "x", "-b", "-512"]), Err(UsageError::BufferSize(-512)));
    }

    #[test]
    fn zero_count_is_rejected() {
        assert_eq!(config(&["-r", "-d", "x", "-c", "0"]), Err(UsageError::Count(0)));
    }

    #[test]
    fn negative_offset_is_rejected() {
        assert_eq!(config(&["-r", "-d", "x", "-o", "-1"]), Err(UsageError::Offset(-1)));
    }

    #[test]
    fn write_zero_requires_write() {
        assert_eq!(config(&["-r", "-z", "-d", "x"]), Err(UsageError::WriteZeroWithoutWrite));
        assert_eq!(config(&["-i", "-z", "-d", "x"]), Err(UsageError::WriteZeroWithoutWrite));
        assert_eq!(config(&["-z", "-d", "x"]), Err(UsageError::WriteZeroWithoutWrite));
    }

    #[test]
    fn range_errors_win_over_missing_device() {
        assert_eq!(config(&["-r", "-c", "0"]), Err(UsageError::Count(0)));
        assert_eq!(config(&["-r"]), Err(UsageError::MissingDevice));
    }

    #[test]
    fn only_read_and_write_transfer_data() {
        assert_eq!(Operation::Read.transfer(), Some(Transfer::Read));
        assert_eq!(Operation::Write.transfer(), Some(Transfer::Write));
        assert_eq!(Operation::Info.transfer(), None);
    }
}
