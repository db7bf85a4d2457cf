//! Clock adapters.
//!
//! - [`SystemClock`]: `esp_timer_get_time()` on the device build,
//!   `std::time::Instant` on the host.  Idles with `std::thread::sleep`,
//!   which maps onto a FreeRTOS delay under ESP-IDF.
//! - [`ManualClock`]: a shared counter that only moves when someone idles
//!   or calls [`ManualClock::advance`].  Drives the scheduler in tests.

use core::cell::Cell;
use std::rc::Rc;

use crate::app::ports::Clock;

/// Monotonic hardware clock.  Copies read the same timer.
#[derive(Clone, Copy)]
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: plain read of the high-resolution timer, no preconditions.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since the clock was created (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        (self.uptime_us() / 1000) as u32
    }

    fn idle(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

/// Simulated clock.  Clones share the same counter.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u32>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the counter at `ms`, e.g. just below the wrap point.
    pub fn starting_at(ms: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(ms)),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }

    fn idle(&self, ms: u32) {
        self.advance(ms);
    }
}
