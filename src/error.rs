use std::{io, path::PathBuf};

/// A rejected command line. Nothing has touched the device yet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Invalid argument \"{flag}\", already specified.")]
    Duplicate { flag: String },
    #[error("Invalid argument \"{flag}\", operation mode already set by \"{other}\".")]
    Conflict { flag: String, other: String },
    #[error("Invalid value \"{value}\" for \"{flag}\". Must be a base-10 integer.")]
    InvalidNumber { flag: String, value: String },
    #[error("Argument \"{flag}\" requires a value.")]
    MissingValue { flag: String },
    #[error("Invalid buffer size specified with \"-b\" ({0}). Must be a positive integer.")]
    BufferSize(i64),
    #[error("Invalid counter specified with \"-c\" ({0}), must be greater than zero.")]
    Count(i64),
    #[error("Invalid offset specified with \"-o\" ({0}). Cannot be a negative number.")]
    Offset(i64),
    #[error("Error, \"-z\" can only be used with \"-w\". Use -h for further details.")]
    WriteZeroWithoutWrite,
    #[error("No block device specified, use \"-d dev_name\".")]
    MissingDevice,
    #[error("{0}")]
    Unrecognized(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("Error opening block device \"{}\": {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("Error repositioning offset to eof: {0}")]
    SeekEnd(#[source] io::Error),
    #[error("Error repositioning offset to start: {0}")]
    SeekStart(#[source] io::Error),
    #[error("Error offsetting to {offset} bytes: {source}")]
    Seek { offset: u64, source: io::Error },
    #[error("Error malloc'ing aligned buf, {size} bytes long (alignment {align}).")]
    Alloc { size: usize, align: usize },
    #[error("Error writing report: {0}")]
    Output(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
