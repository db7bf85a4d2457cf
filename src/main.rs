//! airnode firmware main entry point.
//!
//! Single composition root: everything is built here and handed to the
//! scheduler, nothing lives in a global.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SystemClock  UartTransport / SimulatedSds011  LogReadingSink  │
//! │  (Clock)      (Transport)                      (ReadingSink)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │     Rc<RefCell<AdaptiveCycle<T>>>  (owns Sds011<T>)            │
//! │        ▲                         ▲                             │
//! │   "sensor" task (100 ms)    "cycle" task (1 Hz)                │
//! │        └──────── Scheduler::run_forever ─────────┘             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context as _, Result};
use log::info;

use airnode::adapters::log_sink::LogReadingSink;
use airnode::adapters::sim::SimulatedSds011;
use airnode::adapters::time::SystemClock;
use airnode::app::ports::ReadingSink;
use airnode::config::{NodeConfig, TransportConfig};
use airnode::cycle::{self, AdaptiveCycle};
use airnode::scheduler::Scheduler;
use airnode::sensor::{self, Sds011, Transport};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Platform bootstrap + logging ───────────────────────
    init_logging()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  airnode v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config()?;
    info!(
        "Config: mode={:?} interval={}min window={} transport={:?}",
        config.mode, config.interval_minutes, config.window_samples, config.transport
    );

    // ── 3. Serial link ────────────────────────────────────────
    let clock = SystemClock::new();
    match config.transport {
        TransportConfig::Simulated => run(SimulatedSds011::new(clock), &config, clock),

        #[cfg(target_os = "espidf")]
        TransportConfig::Uart {
            port,
            tx_gpio,
            rx_gpio,
        } => {
            use airnode::adapters::uart::UartTransport;
            use esp_idf_hal::peripherals::Peripherals;

            let p = Peripherals::take()?;
            let uart = match port {
                1 => UartTransport::new(p.uart1, tx_gpio, rx_gpio),
                _ => UartTransport::new(p.uart2, tx_gpio, rx_gpio),
            }
            .context("SDS011 UART init failed")?;
            info!("SDS011 on UART{} (tx={}, rx={})", port, tx_gpio, rx_gpio);
            run(uart, &config, clock)
        }

        #[cfg(not(target_os = "espidf"))]
        TransportConfig::Uart { .. } => Err(airnode::error::Error::from(
            airnode::error::TransportError::Unavailable,
        ))
        .context("UART transport requires the device build"),
    }
}

/// Build the driver, controller, sink and tasks, then hand control to the
/// scheduler for good.
fn run<T: Transport + 'static>(transport: T, config: &NodeConfig, clock: SystemClock) -> ! {
    // ── 4. Core ───────────────────────────────────────────────
    let sds = Sds011::new(transport);
    let node = Rc::new(RefCell::new(AdaptiveCycle::new(
        sds,
        config.interval_minutes,
        config.window_samples,
    )));

    let mut sched = Scheduler::new(clock);

    // ── 5. Upload boundary ────────────────────────────────────
    let sink = Rc::new(RefCell::new(LogReadingSink::new()));
    {
        let handle = sched.handle();
        let sink = sink.clone();
        node.borrow_mut().on_cycle_complete(move |readings| {
            sink.borrow_mut().publish(handle.uptime_ms(), readings);
            Ok(())
        });
    }

    // ── 6. Tasks ──────────────────────────────────────────────
    let n = node.clone();
    sched.create_task("sensor", move |h| sensor::watch(n, h));
    let n = node.clone();
    sched.create_task("cycle", move |h| cycle::watch(n, h));

    node.borrow_mut().set_mode(config.mode);

    info!("System ready. Entering scheduler loop.");
    sched.run_forever()
}

fn load_config() -> Result<NodeConfig> {
    let Some(path) = std::env::args().nth(1) else {
        info!("Config: no file given, using defaults");
        return Ok(NodeConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config = NodeConfig::from_json(&text).with_context(|| format!("loading {path}"))?;
    info!("Config loaded from {}", path);
    Ok(config)
}

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    // `try_init` also installs the `log` → `tracing` bridge.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
