//! Unified error types for the airnode firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! composition root can treat failures uniformly.  All variants are `Copy`
//! and allocation-free; none of them is fatal to the process.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A frame could not be decoded into a packet.
    Protocol(ProtocolError),
    /// A caller-supplied argument was out of range.
    Validation(ValidationError),
    /// A sensor command could not be queued.
    Command(CommandError),
    /// The serial link refused a read or write.
    Transport(TransportError),
    /// An event listener failed (only ever logged, never propagated).
    Listener(ListenerFault),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Listener(e) => write!(f, "listener: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The checksum byte on the wire disagrees with payload + address.
    ChecksumMismatch { observed: u8, expected: u8 },
    /// A measurement was built from a packet whose command is not `0xC0`.
    InvalidCommand(u8),
    /// The frame body is too short or too long to hold a packet.
    InvalidLength(usize),
    /// A measurement payload carries fewer than four data bytes.
    ShortMeasurement(usize),
    /// Ten bytes were collected but the last one was not the end marker.
    MissingEndMarker(u8),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch { observed, expected } => {
                write!(f, "checksum is {observed:02x}, expected {expected:02x}")
            }
            Self::InvalidCommand(cmd) => write!(f, "measurement has to be command c0, got {cmd:02x}"),
            Self::InvalidLength(len) => write!(f, "invalid frame body length {len}"),
            Self::ShortMeasurement(len) => write!(f, "measurement payload too short ({len} bytes)"),
            Self::MissingEndMarker(byte) => write!(f, "expected end marker ab, got {byte:02x}"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// `set_sleep_rhythm` only accepts 0–30 minutes.
    SleepRhythmOutOfRange(i32),
    /// Payloads are at most 13 bytes.
    PayloadTooLong(usize),
    /// Duty-cycle intervals are capped at one day.
    IntervalOutOfRange(u32),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SleepRhythmOutOfRange(m) => {
                write!(f, "sleep time has to be between 0 and 30 minutes, got {m}")
            }
            Self::PayloadTooLong(len) => write!(f, "payload of {len} bytes exceeds 13"),
            Self::IntervalOutOfRange(m) => {
                write!(f, "interval has to be between 0 and 1440 minutes, got {m}")
            }
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Command queue errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The outbound queue already holds its maximum of pending frames.
    QueueFull,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "command queue full"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying write call returned an error.
    WriteFailed,
    /// Fewer bytes than the full frame were accepted.
    ShortWrite { written: usize, expected: usize },
    /// The underlying read call returned an error.
    ReadFailed,
    /// The requested transport is not available in this build.
    Unavailable,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "write failed"),
            Self::ShortWrite { written, expected } => {
                write!(f, "short write ({written} of {expected} bytes)")
            }
            Self::ReadFailed => write!(f, "read failed"),
            Self::Unavailable => write!(f, "transport unavailable in this build"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Listener faults
// ---------------------------------------------------------------------------

/// A listener attached to an [`Event`](crate::events::Event) returned an
/// error or panicked.  Carries the event name and the listener's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerFault {
    pub event: &'static str,
    pub index: usize,
    pub panicked: bool,
}

impl fmt::Display for ListenerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = if self.panicked { "panicked" } else { "failed" };
        write!(f, "listener #{} for {} event {}", self.index, self.event, how)
    }
}

impl From<ListenerFault> for Error {
    fn from(e: ListenerFault) -> Self {
        Self::Listener(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
