//! End-to-end: scheduler, driver, duty cycle and the simulated SDS011
//! wired the same way `main` wires them, on a manual clock.

use std::cell::RefCell;
use std::rc::Rc;

use airnode::adapters::log_sink::LogReadingSink;
use airnode::adapters::sim::SimulatedSds011;
use airnode::adapters::time::ManualClock;
use airnode::app::ports::ReadingSink;
use airnode::cycle::{self, AdaptiveCycle, Mode, Phase, Readings};
use airnode::scheduler::Scheduler;
use airnode::sensor::{self, Sds011};

type Node = Rc<RefCell<AdaptiveCycle<SimulatedSds011<ManualClock>>>>;

struct Harness {
    node: Node,
    sched: Scheduler<ManualClock>,
    windows: Rc<RefCell<Vec<(u64, Readings)>>>,
    sink: Rc<RefCell<LogReadingSink>>,
}

fn boot(interval_minutes: u32, window_samples: u32, mode: Mode) -> Harness {
    let clock = ManualClock::new();
    let sim = SimulatedSds011::new(clock.clone());
    let node: Node = Rc::new(RefCell::new(AdaptiveCycle::new(
        Sds011::new(sim),
        interval_minutes,
        window_samples,
    )));
    let mut sched = Scheduler::new(clock);

    let windows = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::new(RefCell::new(LogReadingSink::new()));
    {
        let handle = sched.handle();
        let w = windows.clone();
        let s = sink.clone();
        node.borrow_mut().on_cycle_complete(move |r| {
            w.borrow_mut().push((handle.uptime_ms(), *r));
            s.borrow_mut().publish(handle.uptime_ms(), r);
            Ok(())
        });
    }

    let n = node.clone();
    sched.create_task("sensor", move |h| sensor::watch(n, h));
    let n = node.clone();
    sched.create_task("cycle", move |h| cycle::watch(n, h));
    node.borrow_mut().set_mode(mode);

    Harness {
        node,
        sched,
        windows,
        sink,
    }
}

#[test]
fn boot_puts_sensor_to_sleep_when_off() {
    let mut h = boot(1, 5, Mode::Off);
    h.sched.run_for(5_000);

    let node = h.node.borrow();
    let sim = node.sensor().transport();
    assert!(!sim.is_awake());
    assert!(!sim.is_push_mode());
    assert_eq!(node.phase(), Some(Phase::Sleep));
    assert_eq!(node.sensor().pending(), 0);
}

#[test]
fn one_interval_produces_averaged_windows() {
    let mut h = boot(1, 5, Mode::Interval);

    // VENT: sensor awake, but in query mode, nothing is averaged.
    h.sched.run_for(29_000);
    {
        let node = h.node.borrow();
        assert_eq!(node.phase(), Some(Phase::Vent));
        assert!(node.sensor().transport().is_awake());
        assert!(!node.sensor().transport().is_push_mode());
    }
    assert!(h.windows.borrow().is_empty());

    // MEASURE: streaming at 1 Hz.
    h.sched.run_for(5_000);
    {
        let node = h.node.borrow();
        assert_eq!(node.phase(), Some(Phase::Measure));
        assert!(node.sensor().transport().is_push_mode());
    }

    // Leave MEASURE at 40 s; by then one full window and a partial one.
    h.sched.run_for(8_000);
    assert_eq!(h.node.borrow().phase(), Some(Phase::Sleep));

    let windows = h.windows.borrow();
    assert_eq!(windows.len(), 2, "windows: {:?}", *windows);
    for (at, r) in windows.iter() {
        assert!((30_000..=40_000).contains(at));
        // The simulated sensor reports 8 to 12 µg/m³ PM2.5.
        assert!(r.pm25 >= 8.0 && r.pm25 <= 12.0, "{:?}", r);
        assert!(r.pm10 > r.pm25);
    }
    assert_eq!(h.sink.borrow().published(), 2);
    assert_eq!(h.node.borrow().sensor().stats().rejected, 0);
}

#[test]
fn sensor_sleeps_between_windows_and_wakes_for_the_next() {
    let mut h = boot(1, 5, Mode::Interval);
    h.sched.run_for(45_000);
    {
        let node = h.node.borrow();
        assert_eq!(node.phase(), Some(Phase::Sleep));
        assert!(!node.sensor().transport().is_awake());
    }

    // SLEEP lasts 60 − 40 = 20 s, then VENT again.
    h.sched.run_for(17_000);
    let node = h.node.borrow();
    assert_eq!(node.phase(), Some(Phase::Vent));
    assert!(node.sensor().transport().is_awake());
    assert_eq!(node.countdown().map(|c| c <= 30), Some(true));
}

#[test]
fn continuous_mode_keeps_reporting() {
    let mut h = boot(1, 5, Mode::Continuous);
    h.sched.run_for(20_000 + 60_000);

    let node = h.node.borrow();
    assert_eq!(node.phase(), Some(Phase::Measure));
    assert_eq!(node.countdown(), None);
    // About 58 measurements in 60 s, five per window.
    let n = h.windows.borrow().len();
    assert!((10..=12).contains(&n), "windows = {}", n);
    assert!(node.sensor().stats().packets >= 50);
}
