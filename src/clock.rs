//! Microsecond timestamps for the measurement loop.

/// Source of monotonic timestamps in whole microseconds.
pub trait Clock {
    fn now_us(&mut self) -> u64;
}

/// The platform's raw monotonic clock.
///
/// On Linux this is `CLOCK_MONOTONIC_RAW`, which is not slewed by NTP.
/// Elsewhere it falls back to [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    base: std::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            base: std::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Clock for MonotonicClock {
    fn now_us(&mut self) -> u64 {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        // Cannot fail for a valid clock id and pointer.
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut ts) };
        (ts.tv_sec as u64) * 1_000_000 + (ts.tv_nsec as u64) / 1_000
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
impl Clock for MonotonicClock {
    fn now_us(&mut self) -> u64 {
        self.base.elapsed().as_micros() as u64
    }
}
