use std::alloc::{self, Layout};

use aligned_vec::{AVec as AlignedVec, RuntimeAlign};

use crate::error::{BenchError, Result};

/// Fallback when the platform cannot report its page size.
const FALLBACK_PAGE_SIZE: usize = 4096;

/// The system memory page size.
#[cfg(unix)]
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}

#[cfg(not(unix))]
pub fn page_size() -> usize {
    FALLBACK_PAGE_SIZE
}

/// A zero-filled I/O buffer whose first byte sits on an `align` boundary.
///
/// Freed on drop, so every exit path of the engine releases it.
pub struct AlignedBuffer {
    inner: AlignedVec<u8, RuntimeAlign>,
}

impl AlignedBuffer {
    /// Allocate `len` zeroed bytes aligned to `align`.
    ///
    /// Both impossible layouts and an allocator that runs dry come back as
    /// [`BenchError::Alloc`] instead of aborting.
    pub fn new(len: usize, align: usize) -> Result<Self> {
        let alloc_error = || BenchError::Alloc { size: len, align };
        if len == 0 {
            return Err(alloc_error());
        }
        let layout = Layout::from_size_align(len, align).map_err(|_| alloc_error())?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(alloc_error());
        }
        // SAFETY: `ptr` holds `len` initialised bytes from the global
        // allocator with exactly the layout AVec deallocates with on drop.
        let inner = unsafe { AlignedVec::from_raw_parts(ptr, align, len, len) };
        Ok(Self { inner })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.inner.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.inner.as_mut_slice()
    }

    pub fn zero(&mut self) {
        self.inner.as_mut_slice().fill(0);
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("addr", &self.as_ptr())
            .field("len", &self.len())
            .finish()
    }
}
