//! Port traits: the boundary between the node's core logic and the outside
//! world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Scheduler / Sds011 / AdaptiveCycle
//! ```
//!
//! Driven adapters (clock, reading sink) implement these traits.  The core
//! consumes them via generics, so it never touches hardware directly and
//! runs unchanged against the mocks in `tests/`.
//!
//! The serial link has its own port, [`Transport`](crate::sensor::transport::Transport),
//! next to the driver that owns it.

use crate::cycle::Readings;

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: hardware timer → scheduler)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond tick source.
///
/// `now_ms` wraps at `u32::MAX` (about 49.7 days); callers compare ticks
/// with [`ticks_diff`], never with `<`.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch, wrapping.
    fn now_ms(&self) -> u32;

    /// Park the hardware thread for `ms` milliseconds.
    ///
    /// The scheduler calls this when no task is due.  Simulated clocks
    /// advance their counter instead of blocking.
    fn idle(&self, ms: u32);
}

/// Signed difference `later - earlier` between two wrapping tick values.
///
/// Correct as long as the real distance is below 2^31 ms.
pub fn ticks_diff(later: u32, earlier: u32) -> i32 {
    later.wrapping_sub(earlier) as i32
}

// ───────────────────────────────────────────────────────────────
// Reading sink port (driven adapter: domain → upload client)
// ───────────────────────────────────────────────────────────────

/// Upstream collaborator that ships aggregated readings off the node.
///
/// Transmission is the sink's business; the core hands over the uptime at
/// which the window closed and the flat key/value mapping.
pub trait ReadingSink {
    fn publish(&mut self, uptime_ms: u64, readings: &Readings);
}
