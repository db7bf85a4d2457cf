//! Recording serial link for integration tests.
//!
//! The driver owns the [`MockTransport`]; the test keeps the matching
//! [`MockLink`] and uses it to script inbound bytes, inject write failures
//! and inspect every frame written, stamped with the clock at write time.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use airnode::adapters::time::ManualClock;
use airnode::app::ports::Clock;
use airnode::protocol::{CMD_MEASUREMENT, FRAME_END, FRAME_START, checksum};
use airnode::sensor::Transport;

// ── Link state ────────────────────────────────────────────────

#[derive(Default)]
pub struct LinkState {
    /// `(tick, frame)` for every accepted write.
    pub writes: Vec<(u32, Vec<u8>)>,
    pub inbound: VecDeque<u8>,
    /// Upcoming writes that return an error.
    pub fail_writes: u32,
    /// Upcoming writes that accept a single byte.
    pub short_writes: u32,
    /// Largest number of bytes a single read hands out.
    pub read_chunk: Option<usize>,
    pub write_attempts: u32,
}

#[derive(Clone)]
pub struct MockLink(Rc<RefCell<LinkState>>);

#[allow(dead_code)]
impl MockLink {
    pub fn state(&self) -> std::cell::RefMut<'_, LinkState> {
        self.0.borrow_mut()
    }

    pub fn push_inbound(&self, bytes: &[u8]) {
        self.0.borrow_mut().inbound.extend(bytes.iter().copied());
    }

    /// Queue a `0xC0` frame with the raw data bytes `[pm25 lo, pm25 hi,
    /// pm10 lo, pm10 hi]`.
    pub fn push_measurement(&self, pm: [u8; 4]) {
        let [a, b, c, d] = pm;
        let data = [a, b, c, d, 0xA1, 0x60];
        let mut frame = vec![FRAME_START, CMD_MEASUREMENT];
        frame.extend_from_slice(&data);
        frame.push(checksum(&data));
        frame.push(FRAME_END);
        self.push_inbound(&frame);
    }

    pub fn write_count(&self) -> usize {
        self.0.borrow().writes.len()
    }

    pub fn write_ticks(&self) -> Vec<u32> {
        self.0.borrow().writes.iter().map(|(t, _)| *t).collect()
    }

    /// First three request payload bytes of every frame written, which is
    /// enough to tell the SDS011 commands apart.
    pub fn requests(&self) -> Vec<[u8; 3]> {
        self.0
            .borrow()
            .writes
            .iter()
            .map(|(_, f)| [f[2], f[3], f[4]])
            .collect()
    }

    pub fn clear_writes(&self) {
        self.0.borrow_mut().writes.clear();
    }
}

// ── Request payload prefixes ──────────────────────────────────

pub const WAKE: [u8; 3] = [0x06, 0x01, 0x01];
pub const SLEEP: [u8; 3] = [0x06, 0x01, 0x00];
pub const PUSH: [u8; 3] = [0x02, 0x01, 0x00];
pub const POLL: [u8; 3] = [0x02, 0x01, 0x01];

// ── MockTransport ─────────────────────────────────────────────

pub struct MockTransport {
    link: MockLink,
    clock: ManualClock,
}

impl MockTransport {
    pub fn new(clock: ManualClock) -> (Self, MockLink) {
        let link = MockLink(Rc::new(RefCell::new(LinkState::default())));
        (
            Self {
                link: link.clone(),
                clock,
            },
            link,
        )
    }
}

#[derive(Debug)]
pub struct InjectedFault;

impl Transport for MockTransport {
    type Error = InjectedFault;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, InjectedFault> {
        let mut st = self.link.0.borrow_mut();
        let limit = st.read_chunk.unwrap_or(usize::MAX);
        let n = buf.len().min(st.inbound.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(st.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, InjectedFault> {
        let mut st = self.link.0.borrow_mut();
        st.write_attempts += 1;
        if st.fail_writes > 0 {
            st.fail_writes -= 1;
            return Err(InjectedFault);
        }
        if st.short_writes > 0 {
            st.short_writes -= 1;
            return Ok(1);
        }
        st.writes.push((self.clock.now_ms(), data.to_vec()));
        Ok(data.len())
    }
}
