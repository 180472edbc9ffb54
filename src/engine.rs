//! The measurement loop.
//!
//! One [`Engine`] owns the device handle and the aligned buffer for the
//! whole run. Both are released by their destructors, so an early `?`
//! return at any step frees exactly what had been acquired.

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::{debug, info, trace};

use crate::buffer::{page_size, AlignedBuffer};
use crate::clock::{Clock, MonotonicClock};
use crate::config::{Config, Transfer};
use crate::device::{probe_size, BlockDevice, Device};
use crate::error::{BenchError, Result};
use crate::{rule, PROGRAM_TITLE};

/// Device and buffer facts printed by the verbose/info banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub device: PathBuf,
    pub device_size: u64,
    pub page_size: usize,
    pub buffer_addr: usize,
    pub buffer_size: usize,
    pub offset: u64,
}

impl Geometry {
    pub fn banner(&self) -> String {
        let rule = rule();
        format!(
            "{rule}\n{PROGRAM_TITLE}\n{rule}\n\
             Device \"{}\" has {} bytes\n\
             System pagesize is {} bytes long.\n\
             Got aligned buffer at {:#x}.\n\
             Buffer is {} bytes long.\n\
             Offsetting to {} bytes.\n\
             {rule}\n",
            self.device.display(),
            self.device_size,
            self.page_size,
            self.buffer_addr,
            self.buffer_size,
            self.offset,
        )
    }
}

/// The single result line of a measured run.
///
/// With seek-back the time is the per-operation average and `count` is 1;
/// otherwise the time covers all `count` operations. `bytes` is what the
/// last operation transferred, never a sum, or `-1` if that call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub offset: u64,
    pub count: u64,
    pub bytes: isize,
    pub time_us: u64,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:013} {:013} {:013} {}",
            self.offset, self.count, self.bytes, self.time_us
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Info mode: geometry only, nothing on stdout.
    Info(Geometry),
    Measured(RunReport),
}

pub struct Engine<'a, D, C = MonotonicClock> {
    config: &'a Config,
    device: D,
    clock: C,
    buffer: AlignedBuffer,
    device_size: u64,
    page_size: usize,
}

impl<'a, D: Device, C: Clock> Engine<'a, D, C> {
    /// Probe the device size and allocate a page-aligned buffer.
    pub fn prepare(config: &'a Config, mut device: D, clock: C) -> Result<Self> {
        let device_size = probe_size(&mut device)?;
        let page_size = page_size();
        let buffer = AlignedBuffer::new(config.buffer_size(), page_size)?;
        info!(
            "Device \"{}\": {} bytes, page size {}, buffer {:?}",
            config.device().display(),
            device_size,
            page_size,
            buffer
        );
        Ok(Self {
            config,
            device,
            clock,
            buffer,
            device_size,
            page_size,
        })
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            device: self.config.device().to_path_buf(),
            device_size: self.device_size,
            page_size: self.page_size,
            buffer_addr: self.buffer.as_ptr() as usize,
            buffer_size: self.buffer.len(),
            offset: self.config.offset(),
        }
    }

    /// Print the banner when asked to, then either stop (info mode) or run
    /// the timed loop and write the result line to `out`.
    pub fn execute<W: Write, E: Write>(&mut self, out: &mut W, diag: &mut E) -> Result<Outcome> {
        let geometry = self.geometry();
        let transfer = self.config.operation().transfer();
        if self.config.verbose() > 0 || transfer.is_none() {
            diag.write_all(geometry.banner().as_bytes())
                .and_then(|_| diag.flush())
                .map_err(BenchError::Output)?;
        }
        let Some(transfer) = transfer else {
            return Ok(Outcome::Info(geometry));
        };

        let report = self.measure(transfer)?;
        writeln!(out, "{report}")
            .and_then(|_| out.flush())
            .map_err(BenchError::Output)?;
        Ok(Outcome::Measured(report))
    }

    /// Time `count` transfers in the given direction.
    ///
    /// A transfer call that fails is not fatal: it shows up as `-1` in the
    /// byte field and its elapsed time still counts.
    pub fn measure(&mut self, transfer: Transfer) -> Result<RunReport> {
        let count = self.config.count();
        let offset = self.config.offset();
        let seek_back = self.config.seek_back();
        let op = transfer.as_str();

        let wanted = self.buffer.len();
        let mut total_us: u64 = 0;
        let mut bytes: isize = 0;
        for i in 0..count {
            // Zeros are the only write pattern.
            self.buffer.zero();

            if i == 0 || seek_back {
                self.device
                    .seek(SeekFrom::Start(offset))
                    .map_err(|source| BenchError::Seek { offset, source })?;
                trace!("Iteration {i}: seek to {offset}");
            }

            let start = self.clock.now_us();
            let result = match transfer {
                Transfer::Read => self.device.read(self.buffer.as_mut_slice()),
                Transfer::Write => self.device.write(self.buffer.as_slice()),
            };
            let end = self.clock.now_us();
            let elapsed = end.saturating_sub(start);
            total_us = total_us.saturating_add(elapsed);

            bytes = match result {
                Ok(n) => {
                    if n < wanted {
                        debug!("Iteration {i}: short {op}, {n} of {wanted} bytes");
                    }
                    n as isize
                }
                Err(err) => {
                    info!("Iteration {i}: {op} failed: {err}");
                    -1
                }
            };
            debug!("Iteration {i}: {op} {bytes} bytes in {elapsed}us");
        }

        let report = if seek_back {
            RunReport {
                offset,
                count: 1,
                bytes,
                time_us: total_us / count,
            }
        } else {
            RunReport {
                offset,
                count,
                bytes,
                time_us: total_us,
            }
        };
        info!("{op} x{count}: {total_us}us total");
        Ok(report)
    }
}

/// Open the configured device and run the benchmark against it.
pub fn run<W: Write, E: Write>(config: &Config, out: &mut W, diag: &mut E) -> Result<Outcome> {
    let device = BlockDevice::open(config.device(), config.use_sync())?;
    let mut engine = Engine::prepare(config, device, MonotonicClock::new())?;
    engine.execute(out, diag)
}
