//! Fixed-length frame reassembly.
//!
//! Wire format (sensor → host, `N = 10`):
//! ```text
//! ┌──────┬─────────────────────────────┬──────┐
//! │ 0xAA │ body (N - 2 bytes)          │ 0xAB │
//! └──────┴─────────────────────────────┴──────┘
//! ```
//!
//! Bytes arrive in arbitrary chunks from a non-blocking read.  The
//! assembler discards noise until a start marker, then collects exactly `N`
//! bytes.  If the last one is not the end marker the whole frame is thrown
//! away and the hunt for `0xAA` begins again.

use heapless::Vec;

use super::{FRAME_END, FRAME_START, MAX_BODY, OUTBOUND_FRAME_LEN};
use crate::error::ProtocolError;

/// Streaming reassembler for frames of exactly `N` bytes.
pub struct FrameAssembler<const N: usize> {
    buf: [u8; N],
    collected: usize,
}

impl<const N: usize> Default for FrameAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameAssembler<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            collected: 0,
        }
    }

    /// Feed one byte.
    ///
    /// Returns `Some(Ok(body))` when a complete, correctly terminated frame
    /// has been collected; `body` excludes both markers and is valid until
    /// the next call.  Returns `Some(Err(MissingEndMarker))` when `N` bytes
    /// were collected but the terminator was wrong.
    pub fn push(&mut self, byte: u8) -> Option<Result<&[u8], ProtocolError>> {
        if self.collected == 0 && byte != FRAME_START {
            return None;
        }

        self.buf[self.collected] = byte;
        self.collected += 1;

        if self.collected < N {
            return None;
        }

        self.collected = 0;
        if byte == FRAME_END {
            Some(Ok(&self.buf[1..N - 1]))
        } else {
            Some(Err(ProtocolError::MissingEndMarker(byte)))
        }
    }

    /// Bytes of the frame currently being collected.
    pub fn pending(&self) -> usize {
        self.collected
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.collected = 0;
    }
}

/// Wrap an encoded packet body in start/end markers.
///
/// Outbound bodies are always full length, so the result is exactly
/// [`OUTBOUND_FRAME_LEN`] for requests.
pub fn wrap_frame(body: &[u8]) -> Option<Vec<u8, OUTBOUND_FRAME_LEN>> {
    if body.len() > MAX_BODY {
        return None;
    }
    let mut out = Vec::new();
    out.push(FRAME_START).ok()?;
    out.extend_from_slice(body).ok()?;
    out.push(FRAME_END).ok()?;
    Some(out)
}
