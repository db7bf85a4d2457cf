//! Rate-limited outbound command queue.
//!
//! The SDS011 drops commands that arrive while it is still processing the
//! previous one, so at most one frame leaves per [`SEND_INTERVAL_MS`].  The
//! queue is bounded; a full queue rejects the new frame instead of
//! overwriting an old one.
//!
//! A frame whose write fails (or is only partially accepted) stays at the
//! head and is tried again in the next window, up to [`MAX_SEND_ATTEMPTS`]
//! times in total.

use heapless::{Deque, Vec};

use crate::app::ports::ticks_diff;
use crate::error::{CommandError, TransportError};
use crate::protocol::OUTBOUND_FRAME_LEN;

pub const QUEUE_CAPACITY: usize = 5;
pub const SEND_INTERVAL_MS: u32 = 800;
pub const MAX_SEND_ATTEMPTS: u8 = 3;

/// One framed command, markers included.
pub type Frame = Vec<u8, OUTBOUND_FRAME_LEN>;

struct Queued {
    frame: Frame,
    attempts: u8,
}

/// Result of one [`CommandQueue::flush`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Nothing queued, or the send window has not opened yet.
    Idle,
    /// The head frame was written in full and removed.
    Sent,
    /// The write failed; the frame stays queued.
    Retry(TransportError),
    /// The write failed for the last time; the frame was discarded.
    Dropped(TransportError),
}

pub struct CommandQueue {
    frames: Deque<Queued, QUEUE_CAPACITY>,
    /// Earliest tick at which the next write may happen.  `None` until the
    /// first write, so the first command goes out immediately.
    next_send: Option<u32>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            frames: Deque::new(),
            next_send: None,
        }
    }

    pub fn enqueue(&mut self, frame: Frame) -> Result<(), CommandError> {
        self.frames
            .push_back(Queued { frame, attempts: 0 })
            .map_err(|_| CommandError::QueueFull)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True when a frame is queued and its send window is open at `now_ms`.
    pub fn is_due(&self, now_ms: u32) -> bool {
        !self.frames.is_empty() && self.next_send.is_none_or(|at| ticks_diff(now_ms, at) >= 0)
    }

    /// Hand the head frame to `write` if its window is open.
    ///
    /// `write` reports how many bytes it accepted.  Any attempt, failed or
    /// not, starts a new window.
    pub fn flush<F>(&mut self, now_ms: u32, write: F) -> Flush
    where
        F: FnOnce(&[u8]) -> Result<usize, TransportError>,
    {
        if !self.is_due(now_ms) {
            return Flush::Idle;
        }
        let Some(head) = self.frames.front_mut() else {
            return Flush::Idle;
        };

        self.next_send = Some(now_ms.wrapping_add(SEND_INTERVAL_MS));
        head.attempts += 1;

        let expected = head.frame.len();
        let failure = match write(&head.frame) {
            Ok(written) if written == expected => None,
            Ok(written) => Some(TransportError::ShortWrite { written, expected }),
            Err(e) => Some(e),
        };

        match failure {
            None => {
                self.frames.pop_front();
                Flush::Sent
            }
            Some(e) if head.attempts >= MAX_SEND_ATTEMPTS => {
                self.frames.pop_front();
                Flush::Dropped(e)
            }
            Some(e) => Flush::Retry(e),
        }
    }
}
