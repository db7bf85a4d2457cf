//! Integration tests for the adaptive duty cycle: phase/mode transitions,
//! the commands each phase queues, and measurement-window averaging.

use std::cell::RefCell;
use std::rc::Rc;

use airnode::adapters::time::ManualClock;
use airnode::app::ports::Clock;
use airnode::cycle::{AdaptiveCycle, Mode, Phase, Readings};
use airnode::sensor::queue::SEND_INTERVAL_MS;
use airnode::sensor::{Sds011, SensorService};

use crate::mock_transport::{MockLink, MockTransport, POLL, PUSH, SLEEP, WAKE};

struct Rig {
    cycle: AdaptiveCycle<MockTransport>,
    link: MockLink,
    clock: ManualClock,
}

impl Rig {
    fn new(interval_minutes: u32, window_samples: u32) -> Self {
        let clock = ManualClock::new();
        let (transport, link) = MockTransport::new(clock.clone());
        let cycle = AdaptiveCycle::new(Sds011::new(transport), interval_minutes, window_samples);
        Self { cycle, link, clock }
    }

    /// Write out every queued command and return their request prefixes.
    fn flush(&mut self) -> Vec<[u8; 3]> {
        self.link.clear_writes();
        while self.cycle.sensor().pending() > 0 {
            self.cycle.poll_sensor(self.clock.now_ms());
            self.clock.advance(SEND_INTERVAL_MS);
        }
        self.link.requests()
    }

    fn ticks(&mut self, n: u32) {
        for _ in 0..n {
            self.cycle.tick();
        }
    }

    /// Deliver one measurement in whole µg/m³ (high bytes zero).
    fn feed(&mut self, pm25: u8, pm10: u8) {
        self.link.push_measurement([pm25, 0, pm10, 0]);
        self.cycle.poll_sensor(self.clock.now_ms());
    }

    fn state(&self) -> (Option<Phase>, Option<i32>) {
        (self.cycle.phase(), self.cycle.countdown())
    }
}

fn close(a: Readings, pm25: f32, pm10: f32) -> bool {
    (a.pm25 - pm25).abs() < 1e-4 && (a.pm10 - pm10).abs() < 1e-4
}

// ── Transitions ───────────────────────────────────────────────

#[test]
fn interval_mode_walks_vent_measure_sleep() {
    let mut r = Rig::new(5, 10);
    assert_eq!(r.flush(), vec![POLL, SLEEP]);

    r.cycle.set_mode(Mode::Interval);
    assert_eq!(r.state(), (Some(Phase::Vent), Some(30)));
    assert_eq!(r.flush(), vec![WAKE, POLL]);

    r.ticks(29);
    assert_eq!(r.state(), (Some(Phase::Vent), Some(1)));
    r.ticks(1);
    assert_eq!(r.state(), (Some(Phase::Measure), Some(10)));
    assert_eq!(r.flush(), vec![WAKE, PUSH]);

    r.ticks(10);
    assert_eq!(r.state(), (Some(Phase::Sleep), Some(60 * 5 - 40)));
    assert_eq!(r.flush(), vec![POLL, SLEEP]);

    r.ticks(260);
    assert_eq!(r.state(), (Some(Phase::Vent), Some(30)));
    assert_eq!(r.flush(), vec![WAKE, POLL]);
}

#[test]
fn off_never_transitions() {
    let mut r = Rig::new(1, 10);
    r.flush();
    r.ticks(10_000);
    assert_eq!(r.state(), (Some(Phase::Sleep), None));
    assert!(r.flush().is_empty());
}

#[test]
fn continuous_mode_measures_indefinitely() {
    let mut r = Rig::new(5, 10);
    r.flush();

    r.cycle.set_mode(Mode::Continuous);
    assert_eq!(r.state(), (Some(Phase::Vent), Some(20)));
    assert_eq!(r.flush(), vec![WAKE, POLL]);

    r.ticks(20);
    assert_eq!(r.state(), (Some(Phase::Measure), None));
    assert_eq!(r.flush(), vec![WAKE, PUSH]);

    r.ticks(5_000);
    assert_eq!(r.state(), (Some(Phase::Measure), None));
    assert!(r.flush().is_empty());
}

#[test]
fn switching_off_mid_measure_sleeps_immediately() {
    let mut r = Rig::new(5, 10);
    r.cycle.set_mode(Mode::Interval);
    r.flush();
    r.ticks(32);
    r.flush();

    r.cycle.set_mode(Mode::Off);
    assert_eq!(r.state(), (Some(Phase::Sleep), None));
    assert_eq!(r.flush(), vec![POLL, SLEEP]);
}

#[test]
fn mode_change_within_vent_only_resets_countdown() {
    let mut r = Rig::new(5, 10);
    r.cycle.set_mode(Mode::Continuous);
    r.ticks(5);
    r.flush();

    r.cycle.set_mode(Mode::Interval);
    assert_eq!(r.state(), (Some(Phase::Vent), Some(30)));
    assert!(r.flush().is_empty());
}

#[test]
fn interval_change_applies_at_next_sleep() {
    let mut r = Rig::new(5, 10);
    r.cycle.set_mode(Mode::Interval);
    r.cycle.set_interval_minutes(2).unwrap();
    r.flush();
    r.ticks(40);
    assert_eq!(r.state(), (Some(Phase::Sleep), Some(80)));
}

// ── Averaging ─────────────────────────────────────────────────

type Recorded = Rc<RefCell<Vec<Readings>>>;

fn record(r: &mut Rig) -> (Recorded, Recorded) {
    let per_sample: Recorded = Rc::default();
    let windows: Recorded = Rc::default();
    let s = per_sample.clone();
    r.cycle.on_measurement(move |m| {
        s.borrow_mut().push(*m);
        Ok(())
    });
    let w = windows.clone();
    r.cycle.on_cycle_complete(move |m| {
        w.borrow_mut().push(*m);
        Ok(())
    });
    (per_sample, windows)
}

#[test]
fn window_completes_at_sample_limit_and_on_leaving_measure() {
    let mut r = Rig::new(5, 3);
    let (samples, windows) = record(&mut r);
    r.cycle.set_mode(Mode::Interval);
    r.flush();
    r.ticks(30);
    r.flush();
    assert!(r.cycle.window().is_open());

    r.feed(10, 20);
    r.feed(20, 40);
    assert!(windows.borrow().is_empty());
    r.feed(30, 60);

    assert_eq!(samples.borrow().len(), 3);
    assert!(close(samples.borrow()[0], 10.0, 20.0));
    assert!(close(samples.borrow()[1], 15.0, 30.0));
    assert_eq!(windows.borrow().len(), 1);
    assert!(close(windows.borrow()[0], 20.0, 40.0));

    // A fresh window starts right away.
    r.feed(40, 80);
    assert_eq!(r.cycle.window().samples(), 1);
    assert!(close(samples.borrow()[3], 40.0, 80.0));

    r.ticks(10);
    assert_eq!(r.cycle.phase(), Some(Phase::Sleep));
    assert_eq!(windows.borrow().len(), 2);
    assert!(close(windows.borrow()[1], 40.0, 80.0));
    assert_eq!(r.cycle.completed_windows(), 2);
}

#[test]
fn measurements_outside_measure_are_ignored() {
    let mut r = Rig::new(5, 3);
    let (samples, windows) = record(&mut r);
    r.cycle.set_mode(Mode::Interval);
    r.flush();

    r.feed(100, 200);
    r.feed(100, 200);
    assert!(samples.borrow().is_empty());
    assert_eq!(r.cycle.window().samples(), 0);

    r.ticks(40);
    assert!(windows.borrow().is_empty());
}

#[test]
fn empty_measure_phase_emits_nothing() {
    let mut r = Rig::new(5, 3);
    let (_samples, windows) = record(&mut r);
    r.cycle.set_mode(Mode::Interval);
    r.flush();
    r.ticks(40);
    assert!(windows.borrow().is_empty());
    assert_eq!(r.cycle.completed_windows(), 0);
}

#[test]
fn leaving_measure_for_vent_flushes_partial_window() {
    let mut r = Rig::new(5, 10);
    let (_samples, windows) = record(&mut r);
    r.cycle.set_mode(Mode::Continuous);
    r.flush();
    r.ticks(20);
    r.flush();

    r.feed(50, 70);
    r.cycle.set_mode(Mode::Continuous);
    assert_eq!(r.cycle.phase(), Some(Phase::Vent));
    assert_eq!(windows.borrow().len(), 1);
    assert!(close(windows.borrow()[0], 50.0, 70.0));
    assert_eq!(r.cycle.window().samples(), 0);
}

#[test]
fn failing_listener_does_not_starve_the_next() {
    let mut r = Rig::new(5, 1);
    r.cycle.on_cycle_complete(|_| anyhow::bail!("collector unreachable"));
    r.cycle.on_cycle_complete(|_| panic!("listener bug"));
    let (_samples, windows) = record(&mut r);

    r.cycle.set_mode(Mode::Continuous);
    r.flush();
    r.ticks(20);
    r.flush();

    r.feed(11, 22);
    assert_eq!(windows.borrow().len(), 1);
    assert!(close(windows.borrow()[0], 11.0, 22.0));
}
