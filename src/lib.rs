//! airnode firmware library.
//!
//! Particulate-matter node built around an SDS011 on a serial link:
//! a cooperative scheduler, the SDS011 wire protocol and driver, and the
//! adaptive duty cycle that decides when the sensor runs.
//!
//! Everything except the UART adapter builds and tests on the host.
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod cycle;
pub mod error;
pub mod events;
pub mod pins;
pub mod protocol;
pub mod scheduler;
pub mod sensor;
