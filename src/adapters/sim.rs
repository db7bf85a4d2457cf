//! In-process SDS011 model for host runs and end-to-end tests.
//!
//! Behaves like the sensor as seen from the serial port:
//!
//! - accepts 19-byte request frames and answers each with a `0xC5` reply,
//! - tracks sleep/work state and query/active reporting mode,
//! - answers `query_data` with one measurement frame,
//! - streams one measurement per second while awake in active mode.
//!
//! A sleeping sensor only listens for the wake request.  Powers up awake in
//! active mode, like the real part.

use std::collections::VecDeque;

use log::debug;

use crate::app::ports::{Clock, ticks_diff};
use crate::protocol::{
    self, CMD_MEASUREMENT, CMD_REPLY, CMD_REQUEST, FRAME_END, FRAME_START, INBOUND_FRAME_LEN,
    OUTBOUND_FRAME_LEN, Packet,
};
use crate::sensor::Transport;

const REPORT_PERIOD_MS: u32 = 1_000;
const DEVICE_ADDRESS: [u8; 2] = [0xA1, 0x60];

// Request selectors (first payload byte).
const SEL_REPORTING_MODE: u8 = 0x02;
const SEL_QUERY: u8 = 0x04;
const SEL_SLEEP_WORK: u8 = 0x06;
const SEL_WORKING_PERIOD: u8 = 0x08;

pub struct SimulatedSds011<C: Clock> {
    clock: C,
    awake: bool,
    active_reporting: bool,
    working_period: u8,
    next_report: u32,
    samples: u32,
    handled: u32,
    outbox: VecDeque<u8>,
}

impl<C: Clock> SimulatedSds011<C> {
    pub fn new(clock: C) -> Self {
        let now = clock.now_ms();
        Self {
            clock,
            awake: true,
            active_reporting: true,
            working_period: 0,
            next_report: now.wrapping_add(REPORT_PERIOD_MS),
            samples: 0,
            handled: 0,
            outbox: VecDeque::new(),
        }
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn is_push_mode(&self) -> bool {
        self.active_reporting
    }

    pub fn working_period(&self) -> u8 {
        self.working_period
    }

    /// Requests acted upon so far.
    pub fn commands_handled(&self) -> u32 {
        self.handled
    }

    /// Measurements emitted so far.
    pub fn samples_emitted(&self) -> u32 {
        self.samples
    }

    fn handle_request(&mut self, payload: &[u8]) {
        let [selector, set, arg, ..] = *payload else {
            return;
        };

        if !self.awake && selector != SEL_SLEEP_WORK {
            debug!("SimSDS011: asleep, ignoring selector {:02x}", selector);
            return;
        }

        let is_set = set == 0x01;
        match selector {
            SEL_REPORTING_MODE => {
                if is_set {
                    let active = arg == 0x00;
                    if active && !self.active_reporting {
                        self.next_report = self.clock.now_ms().wrapping_add(REPORT_PERIOD_MS);
                    }
                    self.active_reporting = active;
                }
                let mode = if self.active_reporting { 0x00 } else { 0x01 };
                self.reply([SEL_REPORTING_MODE, set, mode, 0x00]);
            }
            SEL_QUERY => {
                self.emit_measurement();
            }
            SEL_SLEEP_WORK => {
                if is_set {
                    let wake = arg == 0x01;
                    if wake && !self.awake {
                        self.next_report = self.clock.now_ms().wrapping_add(REPORT_PERIOD_MS);
                    }
                    self.awake = wake;
                }
                self.reply([SEL_SLEEP_WORK, set, u8::from(self.awake), 0x00]);
            }
            SEL_WORKING_PERIOD => {
                if is_set {
                    self.working_period = arg;
                }
                self.reply([SEL_WORKING_PERIOD, set, self.working_period, 0x00]);
            }
            other => {
                debug!("SimSDS011: unknown selector {:02x}", other);
                return;
            }
        }
        self.handled += 1;
    }

    fn reply(&mut self, data: [u8; 4]) {
        self.outbox.extend(frame(CMD_REPLY, data));
    }

    fn emit_measurement(&mut self) {
        let n = self.samples;
        self.samples = self.samples.wrapping_add(1);

        // A slow sawtooth in whole µg/m³, carried in the low bytes.
        let pm25 = 8 + (n.wrapping_mul(37) % 5) as u8;
        let pm10 = pm25 + 4 + (n.wrapping_mul(13) % 3) as u8;
        self.outbox.extend(frame(CMD_MEASUREMENT, [pm25, 0, pm10, 0]));
    }

    fn stream(&mut self) {
        if !(self.awake && self.active_reporting) {
            return;
        }
        let now = self.clock.now_ms();
        while ticks_diff(now, self.next_report) >= 0 {
            self.emit_measurement();
            self.next_report = self.next_report.wrapping_add(REPORT_PERIOD_MS);
        }
    }
}

fn frame(command: u8, data: [u8; 4]) -> [u8; INBOUND_FRAME_LEN] {
    let [a0, a1] = DEVICE_ADDRESS;
    let cs = protocol::checksum(&data).wrapping_add(protocol::checksum(&DEVICE_ADDRESS));
    [FRAME_START, command, data[0], data[1], data[2], data[3], a0, a1, cs, FRAME_END]
}

impl<C: Clock> Transport for SimulatedSds011<C> {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream();
        let n = buf.len().min(self.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let well_formed = data.len() == OUTBOUND_FRAME_LEN
            && data.first() == Some(&FRAME_START)
            && data.last() == Some(&FRAME_END);
        if !well_formed {
            debug!("SimSDS011: ignoring {} malformed bytes", data.len());
            return Ok(data.len());
        }

        match protocol::decode(&data[1..data.len() - 1]) {
            Ok(Packet::Generic(p)) if p.command == CMD_REQUEST => self.handle_request(&p.payload),
            Ok(other) => debug!("SimSDS011: ignoring {}", other),
            Err(e) => debug!("SimSDS011: bad request: {}", e),
        }
        Ok(data.len())
    }
}
