//! Adaptive duty cycle for the SDS011.
//!
//! The sensor's fan and laser wear out, so the node keeps it asleep most of
//! the time and only wakes it for short measurement windows.
//!
//! ```text
//!  INTERVAL:   ┌──────────┐ 30 s ┌─────────┐ 10 s ┌──────────────────┐
//!         ┌───▶│   VENT   │─────▶│ MEASURE │─────▶│      SLEEP       │──┐
//!         │    └──────────┘      └─────────┘      │ 60·interval − 40 │  │
//!         │                                       └──────────────────┘  │
//!         └─────────────────────────────────────────────────────────────┘
//!
//!  CONTINUOUS: VENT ──20 s──▶ MEASURE (no countdown, stays forever)
//!
//!  OFF:        SLEEP (no countdown, stays forever)
//! ```
//!
//! Phase changes only happen in [`AdaptiveCycle::set_mode`] and in the
//! 1 Hz [`AdaptiveCycle::tick`].  Entering a phase queues the commands in
//! its row of the phase table; re-entering the current phase does nothing.
//!
//! Measurements are averaged only while in MEASURE.  See [`MeasureWindow`].

pub mod average;

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ValidationError};
use crate::events::Event;
use crate::protocol::Packet;
use crate::scheduler::SchedulerHandle;
use crate::sensor::{Activity, PacketHandler, Sds011, SensorCommand, SensorService, Transport};

pub use average::{Readings, RunningAverage};

/// VENT length when cycling on an interval.
pub const VENT_SECS: i32 = 30;
/// VENT length before continuous measuring.
pub const CONTINUOUS_VENT_SECS: i32 = 20;
/// MEASURE length when cycling on an interval.
pub const MEASURE_SECS: i32 = 10;
/// Longest supported measurement interval (one day).
pub const MAX_INTERVAL_MINUTES: u32 = 24 * 60;

// ═══════════════════════════════════════════════════════════════
//  Mode and phase
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Off,
    Interval,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Sleep = 0,
    Vent = 1,
    Measure = 2,
}

impl Phase {
    pub const COUNT: usize = 3;

    pub fn name(self) -> &'static str {
        PHASE_TABLE[self as usize].name
    }
}

/// One row of the phase table.
pub struct PhaseDescriptor {
    pub phase: Phase,
    pub name: &'static str,
    /// Queued, in order, whenever the phase is entered.
    pub on_enter: &'static [SensorCommand],
}

/// Indexed by `Phase as usize`.
pub static PHASE_TABLE: [PhaseDescriptor; Phase::COUNT] = [
    PhaseDescriptor {
        phase: Phase::Sleep,
        name: "SLEEP",
        on_enter: &[SensorCommand::PollMode, SensorCommand::Sleep],
    },
    PhaseDescriptor {
        phase: Phase::Vent,
        name: "VENT",
        on_enter: &[SensorCommand::Wake, SensorCommand::PollMode],
    },
    PhaseDescriptor {
        phase: Phase::Measure,
        name: "MEASURE",
        on_enter: &[SensorCommand::Wake, SensorCommand::PushMode],
    },
];

// ═══════════════════════════════════════════════════════════════
//  Measurement window
// ═══════════════════════════════════════════════════════════════

/// Averaging state for the MEASURE phase.
///
/// While open, every measurement is folded into the running mean and the
/// `measurement` event fires with the mean so far.  The window completes
/// (firing `cycle_complete`) when it holds `limit` samples, after which it
/// starts over, or when MEASURE is left with at least one sample.
pub struct MeasureWindow {
    open: bool,
    average: RunningAverage,
    limit: u32,
    completed: u32,
    measurement: Event<Readings>,
    cycle_complete: Event<Readings>,
}

impl MeasureWindow {
    fn new(limit: u32) -> Self {
        Self {
            open: false,
            average: RunningAverage::default(),
            limit: limit.max(1),
            completed: 0,
            measurement: Event::new("measurement"),
            cycle_complete: Event::new("cycle_complete"),
        }
    }

    fn open(&mut self) {
        self.average.reset();
        self.open = true;
    }

    fn close(&mut self) {
        if self.open && self.average.count() > 0 {
            self.complete();
        }
        self.average.reset();
        self.open = false;
    }

    fn complete(&mut self) {
        if let Some(mean) = self.average.mean() {
            info!(
                "Cycle: window complete ({} samples): {:.1} PM2.5, {:.1} PM10",
                self.average.count(),
                mean.pm25,
                mean.pm10
            );
            self.completed += 1;
            self.cycle_complete.trigger(&mean);
        }
        self.average.reset();
    }

    pub fn samples(&self) -> u32 {
        self.average.count()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl PacketHandler for MeasureWindow {
    fn on_packet(&mut self, packet: Packet) {
        let Packet::Measurement(m) = packet else {
            debug!("Cycle: ignoring {}", packet);
            return;
        };
        if !self.open {
            debug!("Cycle: measurement outside MEASURE ignored ({})", m);
            return;
        }

        self.average.add(Readings::from(&m));
        if let Some(mean) = self.average.mean() {
            self.measurement.trigger(&mean);
        }
        if self.average.count() >= self.limit {
            self.complete();
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Controller
// ═══════════════════════════════════════════════════════════════

pub struct AdaptiveCycle<T: Transport> {
    sensor: Sds011<T>,
    window: MeasureWindow,
    mode: Mode,
    phase: Option<Phase>,
    countdown: Option<i32>,
    interval_minutes: u32,
}

impl<T: Transport> AdaptiveCycle<T> {
    /// Take over `sensor` and put it to sleep (mode OFF).
    ///
    /// `interval_minutes` above [`MAX_INTERVAL_MINUTES`] is clamped.
    pub fn new(sensor: Sds011<T>, interval_minutes: u32, window_samples: u32) -> Self {
        if interval_minutes > MAX_INTERVAL_MINUTES {
            warn!(
                "Cycle: interval {}min clamped to {}min",
                interval_minutes, MAX_INTERVAL_MINUTES
            );
        }
        let interval_minutes = interval_minutes.min(MAX_INTERVAL_MINUTES);
        let mut cycle = Self {
            sensor,
            window: MeasureWindow::new(window_samples),
            mode: Mode::Off,
            phase: None,
            countdown: None,
            interval_minutes,
        };
        cycle.set_mode(Mode::Off);
        cycle
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Seconds until the next transition, if one is scheduled.
    pub fn countdown(&self) -> Option<i32> {
        self.countdown
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// Takes effect at the next SLEEP entry.
    pub fn set_interval_minutes(&mut self, minutes: u32) -> Result<(), Error> {
        if minutes > MAX_INTERVAL_MINUTES {
            return Err(ValidationError::IntervalOutOfRange(minutes).into());
        }
        self.interval_minutes = minutes;
        Ok(())
    }

    pub fn sensor(&self) -> &Sds011<T> {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut Sds011<T> {
        &mut self.sensor
    }

    pub fn window(&self) -> &MeasureWindow {
        &self.window
    }

    /// Number of windows that have completed since start.
    pub fn completed_windows(&self) -> u32 {
        self.window.completed
    }

    /// Listener fires once per folded measurement with the running mean.
    pub fn on_measurement(&mut self, listener: impl FnMut(&Readings) -> anyhow::Result<()> + 'static) {
        self.window.measurement.listen(listener);
    }

    /// Listener fires with the mean of each completed window.
    pub fn on_cycle_complete(&mut self, listener: impl FnMut(&Readings) -> anyhow::Result<()> + 'static) {
        self.window.cycle_complete.listen(listener);
    }

    /// Switch mode.  Immediately re-derives phase and countdown.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            info!("Cycle: mode {:?} -> {:?}", self.mode, mode);
        }
        match mode {
            Mode::Off => {
                self.enter_phase(Phase::Sleep);
                self.countdown = None;
            }
            Mode::Interval => {
                self.enter_phase(Phase::Vent);
                self.countdown = Some(VENT_SECS);
            }
            Mode::Continuous => {
                self.enter_phase(Phase::Vent);
                self.countdown = Some(CONTINUOUS_VENT_SECS);
            }
        }
        self.mode = mode;
    }

    /// Advance one second.
    pub fn tick(&mut self) {
        let Some(remaining) = self.countdown else {
            return;
        };
        let remaining = remaining - 1;
        self.countdown = Some(remaining);
        if remaining > 0 {
            return;
        }

        let Some(phase) = self.phase else {
            return;
        };
        match phase {
            Phase::Sleep => {
                self.enter_phase(Phase::Vent);
                self.countdown = Some(VENT_SECS);
            }
            Phase::Vent => {
                self.enter_phase(Phase::Measure);
                self.countdown = (self.mode == Mode::Interval).then_some(MEASURE_SECS);
            }
            Phase::Measure => {
                self.enter_phase(Phase::Sleep);
                self.countdown = Some(sleep_secs(self.interval_minutes));
            }
        }
    }

    fn enter_phase(&mut self, next: Phase) {
        if self.phase == Some(next) {
            return;
        }

        let row = &PHASE_TABLE[next as usize];
        for &command in row.on_enter {
            if let Err(e) = self.sensor.issue(command) {
                warn!("Cycle: could not queue {:?} for {}: {}", command, row.name, e);
            }
        }

        info!(
            "Cycle: phase {} -> {}",
            self.phase.map_or("[NONE]", Phase::name),
            row.name
        );

        match next {
            Phase::Measure => self.window.open(),
            Phase::Sleep | Phase::Vent => self.window.close(),
        }
        self.phase = Some(next);
    }
}

/// SLEEP length for an interval of `minutes`; the 40 s of VENT and MEASURE
/// are carved out of the period.  Negative for `minutes == 0`, which makes
/// the next tick leave SLEEP straight away.  Saturates at `i32::MAX`.
pub fn sleep_secs(minutes: u32) -> i32 {
    let secs = 60 * i64::from(minutes) - i64::from(VENT_SECS + MEASURE_SECS);
    i32::try_from(secs).unwrap_or(i32::MAX)
}

impl<T: Transport> SensorService for AdaptiveCycle<T> {
    fn poll_sensor(&mut self, now_ms: u32) -> Activity {
        self.sensor.poll(now_ms, &mut self.window)
    }
}

/// Run the 1 Hz cycle tick forever.
pub async fn watch<T: Transport>(cycle: Rc<RefCell<AdaptiveCycle<T>>>, sched: SchedulerHandle) {
    info!("Cycle: tick task started");
    loop {
        sched.sleep(1).await;
        cycle.borrow_mut().tick();
    }
}
