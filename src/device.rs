use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::info;

use crate::error::{BenchError, Result};

/// Anything the engine can time I/O against.
pub trait Device: Read + Write + Seek {}

impl<T: Read + Write + Seek> Device for T {}

/// A block device or file opened read/write with the page cache bypassed.
///
/// The descriptor is closed when the value is dropped.
#[derive(Debug)]
pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    /// Open `path` for unbuffered read/write access, adding `O_SYNC`
    /// semantics when `sync` is set.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = open_options(sync)
            .open(path)
            .and_then(|file| disable_cache(file, path))
            .map_err(|source| BenchError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Opened \"{}\" unbuffered{}", path.display(), if sync { " with O_SYNC" } else { "" });
        Ok(Self { file })
    }
}

fn open_options(sync: bool) -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true);
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android"))] {
            use std::os::unix::fs::OpenOptionsExt;
            let mut flags = libc::O_DIRECT | libc::O_LARGEFILE;
            if sync {
                flags |= libc::O_SYNC;
            }
            opts.custom_flags(flags);
        } else if #[cfg(unix)] {
            use std::os::unix::fs::OpenOptionsExt;
            if sync {
                opts.custom_flags(libc::O_SYNC);
            }
        } else if #[cfg(windows)] {
            use std::os::windows::fs::OpenOptionsExt;
            const FILE_FLAG_WRITE_THROUGH: u32 = 0x8000_0000;
            const FILE_FLAG_NO_BUFFERING: u32 = 0x2000_0000;
            let mut flags = FILE_FLAG_NO_BUFFERING;
            if sync {
                flags |= FILE_FLAG_WRITE_THROUGH;
            }
            opts.custom_flags(flags);
        } else {
            if sync {
                log::warn!("Synchronous open is not supported on this platform. Ignored.");
            }
        }
    }
    opts
}

#[cfg(target_os = "macos")]
fn disable_cache(file: File, _path: &Path) -> io::Result<File> {
    use std::os::unix::io::AsRawFd;
    // No O_DIRECT on macOS; F_NOCACHE is the per-descriptor equivalent.
    if unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(file)
}

#[cfg(any(target_os = "linux", target_os = "android", windows))]
fn disable_cache(file: File, _path: &Path) -> io::Result<File> {
    Ok(file)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos", windows)))]
fn disable_cache(file: File, path: &Path) -> io::Result<File> {
    log::warn!(
        "Direct I/O is not supported on this platform; \"{}\" goes through the page cache.",
        path.display()
    );
    Ok(file)
}

/// Size of the device in bytes: seek to the end, then back to the start.
pub fn probe_size<D: Seek + ?Sized>(device: &mut D) -> Result<u64> {
    let size = device.seek(SeekFrom::End(0)).map_err(BenchError::SeekEnd)?;
    device.seek(SeekFrom::Start(0)).map_err(BenchError::SeekStart)?;
    Ok(size)
}

impl Read for BlockDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for BlockDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for BlockDevice {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
