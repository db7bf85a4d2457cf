//! SDS011 driver.
//!
//! The driver owns the serial [`Transport`] and does three things on every
//! [`Sds011::poll`]:
//!
//! 1. writes the head of the [`CommandQueue`] if its 800 ms window is open,
//! 2. does one non-blocking read,
//! 3. feeds the bytes through the [`FrameAssembler`] and hands each decoded
//!    packet to a [`PacketHandler`].
//!
//! The command methods (`wake`, `sleep`, …) never touch the transport.
//! They only frame a request and queue it.
//!
//! [`watch`] is the scheduled task wrapped around `poll`.

pub mod queue;
pub mod transport;

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::error::{Error, ProtocolError, TransportError, ValidationError};
use crate::protocol::codec::{FrameAssembler, wrap_frame};
use crate::protocol::{self, INBOUND_FRAME_LEN, Packet, RawPacket};
use crate::scheduler::SchedulerHandle;

pub use queue::{CommandQueue, Flush};
pub use transport::Transport;

/// How long the sensor task sleeps after a read that returned nothing.
pub const IDLE_POLL_MS: u32 = 100;

/// Longest accepted `set_sleep_rhythm` argument, in minutes.
pub const MAX_SLEEP_RHYTHM_MIN: i32 = 30;

const READ_CHUNK: usize = 32;

// ═══════════════════════════════════════════════════════════════
//  Handler seam
// ═══════════════════════════════════════════════════════════════

/// Receives every packet that survived framing and checksum validation.
pub trait PacketHandler {
    fn on_packet(&mut self, packet: Packet);
}

/// A handler that ignores everything.
impl PacketHandler for () {
    fn on_packet(&mut self, _packet: Packet) {}
}

/// Collects packets, mostly useful in tests and diagnostics.
impl PacketHandler for Vec<Packet> {
    fn on_packet(&mut self, packet: Packet) {
        self.push(packet);
    }
}

/// Whether a poll found bytes on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// The read returned nothing (or failed).
    Idle,
    /// Bytes were consumed; more may be waiting.
    Busy,
}

/// High-level requests understood by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCommand {
    Wake,
    Sleep,
    /// Query mode: the sensor answers only `query_data`.
    PollMode,
    /// Active reporting: the sensor streams a measurement every second.
    PushMode,
}

/// Link counters, monotonically increasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub packets: u32,
    pub rejected: u32,
    pub framing_errors: u32,
    pub sent: u32,
    pub retries: u32,
    pub dropped: u32,
    pub read_errors: u32,
}

// ═══════════════════════════════════════════════════════════════
//  Driver
// ═══════════════════════════════════════════════════════════════

pub struct Sds011<T: Transport> {
    transport: T,
    queue: CommandQueue,
    assembler: FrameAssembler<INBOUND_FRAME_LEN>,
    stats: LinkStats,
}

impl<T: Transport> Sds011<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            queue: CommandQueue::new(),
            assembler: FrameAssembler::new(),
            stats: LinkStats::default(),
        }
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Number of commands waiting to be written.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// One pass of the link: flush, read, reassemble, dispatch.
    pub fn poll(&mut self, now_ms: u32, handler: &mut impl PacketHandler) -> Activity {
        self.flush_queue(now_ms);

        let mut buf = [0u8; READ_CHUNK];
        let n = match self.transport.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                self.stats.read_errors += 1;
                warn!("SDS011: read failed: {:?}", e);
                return Activity::Idle;
            }
        };
        if n == 0 {
            return Activity::Idle;
        }

        for &byte in &buf[..n] {
            let decoded = match self.assembler.push(byte) {
                None => continue,
                Some(Ok(body)) => protocol::decode(body),
                Some(Err(e)) => Err(e),
            };

            match decoded {
                Ok(packet) => {
                    self.stats.packets += 1;
                    debug!("SDS011: received {}", packet);
                    handler.on_packet(packet);
                }
                Err(e @ ProtocolError::MissingEndMarker(_)) => {
                    self.stats.framing_errors += 1;
                    warn!("SDS011: framing error: {}", e);
                }
                Err(e) => {
                    self.stats.rejected += 1;
                    warn!("SDS011: invalid packet: {}", e);
                }
            }
        }

        Activity::Busy
    }

    fn flush_queue(&mut self, now_ms: u32) {
        let transport = &mut self.transport;
        let outcome = self.queue.flush(now_ms, |frame| {
            transport.write(frame).map_err(|e| {
                debug!("SDS011: transport write error: {:?}", e);
                TransportError::WriteFailed
            })
        });

        match outcome {
            Flush::Idle => {}
            Flush::Sent => {
                self.stats.sent += 1;
                if let Err(e) = self.transport.flush() {
                    debug!("SDS011: flush failed: {:?}", e);
                }
            }
            Flush::Retry(e) => {
                self.stats.retries += 1;
                warn!("SDS011: write failed ({}), retrying", e);
            }
            Flush::Dropped(e) => {
                self.stats.dropped += 1;
                warn!("SDS011: write failed ({}), command dropped", e);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Command API
    // -----------------------------------------------------------------------

    /// Frame `packet` and queue it.
    pub fn write_packet(&mut self, packet: &Packet) -> Result<(), Error> {
        let frame = wrap_frame(&packet.encode()).ok_or(ValidationError::PayloadTooLong(
            packet.raw().payload.len(),
        ))?;
        if let Err(e) = self.queue.enqueue(frame) {
            warn!("SDS011: queue full, rejecting {}", packet);
            return Err(e.into());
        }
        debug!("SDS011: queued {}", packet);
        Ok(())
    }

    /// Queue a broadcast request carrying `data`, zero-padded to 13 bytes.
    pub fn write_command(&mut self, data: &[u8]) -> Result<(), Error> {
        let packet = Packet::Generic(RawPacket::request(data)?);
        self.write_packet(&packet)
    }

    pub fn set_active_reporting(&mut self, enabled: bool) -> Result<(), Error> {
        self.write_command(&[0x02, 0x01, if enabled { 0x00 } else { 0x01 }])
    }

    pub fn use_push_mode(&mut self) -> Result<(), Error> {
        self.set_active_reporting(true)
    }

    pub fn use_poll_mode(&mut self) -> Result<(), Error> {
        self.set_active_reporting(false)
    }

    pub fn query_data(&mut self) -> Result<(), Error> {
        self.write_command(&[0x04])
    }

    pub fn sleep(&mut self) -> Result<(), Error> {
        self.write_command(&[0x06, 0x01, 0x00])
    }

    pub fn wake(&mut self) -> Result<(), Error> {
        self.write_command(&[0x06, 0x01, 0x01])
    }

    /// Program the sensor's own working period.  0 means continuous.
    pub fn set_sleep_rhythm(&mut self, minutes: i32) -> Result<(), Error> {
        if !(0..=MAX_SLEEP_RHYTHM_MIN).contains(&minutes) {
            return Err(ValidationError::SleepRhythmOutOfRange(minutes).into());
        }
        self.write_command(&[0x08, 0x01, minutes as u8])
    }

    pub fn issue(&mut self, command: SensorCommand) -> Result<(), Error> {
        match command {
            SensorCommand::Wake => self.wake(),
            SensorCommand::Sleep => self.sleep(),
            SensorCommand::PollMode => self.use_poll_mode(),
            SensorCommand::PushMode => self.use_push_mode(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduled task
// ═══════════════════════════════════════════════════════════════

/// Anything that owns a driver and knows which handler to poll it with.
pub trait SensorService {
    fn poll_sensor(&mut self, now_ms: u32) -> Activity;
}

/// Run the sensor link forever.  Yields between busy passes and sleeps
/// [`IDLE_POLL_MS`] when the link is quiet.
pub async fn watch<S: SensorService>(service: Rc<RefCell<S>>, sched: SchedulerHandle) {
    info!("SDS011: link task started");
    loop {
        let activity = service.borrow_mut().poll_sensor(sched.now_ms());
        match activity {
            Activity::Idle => sched.sleep_ms(IDLE_POLL_MS).await,
            Activity::Busy => sched.yield_now().await,
        }
    }
}
