//! Raw block-device I/O benchmarking.
//!
//! Opens a device (or file) bypassing the page cache, runs `count`
//! reads or writes of a fixed page-aligned buffer at a given offset and
//! reports the elapsed microseconds and bytes moved.

pub mod buffer;
pub mod cli;
pub mod clock;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod logging;

pub use buffer::{page_size, AlignedBuffer};
pub use cli::{parse_args, usage, Invocation};
pub use clock::{Clock, MonotonicClock};
pub use config::{Config, Operation, Transfer};
pub use device::BlockDevice;
pub use engine::{run, Engine, Geometry, Outcome, RunReport};
pub use error::{BenchError, Result, UsageError};

/// Title printed between the rule lines of the usage and geometry banners.
pub const PROGRAM_TITLE: &str = "Random I/O Performance Measurement Tool";

/// Default I/O size: 1MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
pub const DEFAULT_COUNT: u64 = 1;
pub const DEFAULT_OFFSET: u64 = 0;

/// A rule line as long as [`PROGRAM_TITLE`].
pub fn rule() -> String {
    "-".repeat(PROGRAM_TITLE.len())
}
