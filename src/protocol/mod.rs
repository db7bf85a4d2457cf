//! SDS011 packet model.
//!
//! A packet body on the wire is
//!
//! ```text
//! ┌─────┬──────────────────┬──────────┬──────────┐
//! │ cmd │ payload (0–13 B) │ addr (2) │ checksum │
//! └─────┴──────────────────┴──────────┴──────────┘
//! ```
//!
//! and is wrapped in `0xAA … 0xAB` by [`codec::wrap_frame`].  The checksum
//! is the byte sum of payload and address, mod 256.  It is never stored:
//! [`Packet::encode`] computes it and [`decode`] validates it.

pub mod codec;

use core::fmt;

use heapless::Vec;

use crate::error::{ProtocolError, ValidationError};

// ═══════════════════════════════════════════════════════════════
//  Wire constants
// ═══════════════════════════════════════════════════════════════

pub const FRAME_START: u8 = 0xAA;
pub const FRAME_END: u8 = 0xAB;

/// Command byte of a measurement report.
pub const CMD_MEASUREMENT: u8 = 0xC0;
/// Command byte of every host → sensor request.
pub const CMD_REQUEST: u8 = 0xB4;
/// Command byte of the sensor's reply to a request.
pub const CMD_REPLY: u8 = 0xC5;

pub const BROADCAST: [u8; 2] = [0xFF, 0xFF];

pub const MAX_PAYLOAD: usize = 13;
/// `cmd + payload + addr + checksum` at maximum payload.
pub const MAX_BODY: usize = 1 + MAX_PAYLOAD + 2 + 1;
/// Sensor → host frames are always this long, markers included.
pub const INBOUND_FRAME_LEN: usize = 10;
/// Host → sensor frames are always this long, markers included.
pub const OUTBOUND_FRAME_LEN: usize = MAX_BODY + 2;

const MIN_BODY: usize = 1 + 2 + 1;

pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// Byte sum mod 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

// ═══════════════════════════════════════════════════════════════
//  Packets
// ═══════════════════════════════════════════════════════════════

/// A packet of any command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub command: u8,
    pub payload: Payload,
    pub address: [u8; 2],
}

impl RawPacket {
    pub fn new(command: u8, payload: &[u8], address: [u8; 2]) -> Result<Self, ValidationError> {
        let payload =
            Payload::from_slice(payload).map_err(|()| ValidationError::PayloadTooLong(payload.len()))?;
        Ok(Self {
            command,
            payload,
            address,
        })
    }

    /// Build a broadcast request: `data` zero-padded to 13 bytes under
    /// command `0xB4`.
    pub fn request(data: &[u8]) -> Result<Self, ValidationError> {
        if data.len() > MAX_PAYLOAD {
            return Err(ValidationError::PayloadTooLong(data.len()));
        }
        let mut padded = [0u8; MAX_PAYLOAD];
        padded[..data.len()].copy_from_slice(data);
        Self::new(CMD_REQUEST, &padded, BROADCAST)
    }

    pub fn checksum(&self) -> u8 {
        checksum(&self.payload).wrapping_add(checksum(&self.address))
    }
}

impl fmt::Display for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:", self.command)?;
        for b in &self.payload {
            write!(f, " {b:02x}")?;
        }
        write!(f, " [{:02x} {:02x}]", self.address[0], self.address[1])
    }
}

/// A `0xC0` packet.  Construction guarantees at least four payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    packet: RawPacket,
}

impl Measurement {
    /// PM2.5 in µg/m³.
    pub fn pm25(&self) -> f32 {
        decode_concentration(self.packet.payload[0], self.packet.payload[1])
    }

    /// PM10 in µg/m³.
    pub fn pm10(&self) -> f32 {
        decode_concentration(self.packet.payload[2], self.packet.payload[3])
    }

    pub fn packet(&self) -> &RawPacket {
        &self.packet
    }
}

impl TryFrom<RawPacket> for Measurement {
    type Error = ProtocolError;

    fn try_from(packet: RawPacket) -> Result<Self, ProtocolError> {
        if packet.command != CMD_MEASUREMENT {
            return Err(ProtocolError::InvalidCommand(packet.command));
        }
        if packet.payload.len() < 4 {
            return Err(ProtocolError::ShortMeasurement(packet.payload.len()));
        }
        Ok(Self { packet })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} µg/m³ PM10, {:.1} µg/m³ PM2.5", self.pm10(), self.pm25())
    }
}

/// The low byte counts whole µg/m³; only the high-byte term is in tenths.
fn decode_concentration(low: u8, high: u8) -> f32 {
    f32::from(low) + f32::from(u16::from(high) << 8) / 10.0
}

/// Decoded packet kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Generic(RawPacket),
    Measurement(Measurement),
}

impl Packet {
    pub fn raw(&self) -> &RawPacket {
        match self {
            Self::Generic(p) => p,
            Self::Measurement(m) => &m.packet,
        }
    }

    pub fn command(&self) -> u8 {
        self.raw().command
    }

    /// `cmd ‖ payload ‖ addr ‖ checksum`, without frame markers.
    pub fn encode(&self) -> Vec<u8, MAX_BODY> {
        let raw = self.raw();
        let mut out = Vec::new();
        // Capacity is MAX_BODY and payload is bounded by MAX_PAYLOAD, so
        // none of these pushes can fail.
        let _ = out.push(raw.command);
        let _ = out.extend_from_slice(&raw.payload);
        let _ = out.extend_from_slice(&raw.address);
        let _ = out.push(raw.checksum());
        out
    }
}

impl From<RawPacket> for Packet {
    /// Classify by command byte.  A `0xC0` packet too short to be a
    /// measurement stays generic.
    fn from(raw: RawPacket) -> Self {
        if raw.command == CMD_MEASUREMENT && raw.payload.len() >= 4 {
            Self::Measurement(Measurement { packet: raw })
        } else {
            Self::Generic(raw)
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(p) => p.fmt(f),
            Self::Measurement(m) => m.fmt(f),
        }
    }
}

/// Decode a packet body (frame markers already stripped).
pub fn decode(body: &[u8]) -> Result<Packet, ProtocolError> {
    if !(MIN_BODY..=MAX_BODY).contains(&body.len()) {
        return Err(ProtocolError::InvalidLength(body.len()));
    }

    let (head, tail) = body.split_at(body.len() - 3);
    let command = head[0];
    let address = [tail[0], tail[1]];
    let observed = tail[2];

    let raw = RawPacket {
        command,
        payload: Payload::from_slice(&head[1..]).map_err(|()| ProtocolError::InvalidLength(body.len()))?,
        address,
    };

    let expected = raw.checksum();
    if observed != expected {
        return Err(ProtocolError::ChecksumMismatch { observed, expected });
    }

    if command == CMD_MEASUREMENT {
        return Measurement::try_from(raw).map(Packet::Measurement);
    }
    Ok(Packet::Generic(raw))
}
