//! Log-based reading sink adapter.
//!
//! Implements [`ReadingSink`] by writing one CSV row per value to the
//! logger (UART / USB-CDC on the device, stderr on the host), followed by
//! the JSON body an HTTP upload client would post for the same window.

use log::{info, warn};

use crate::app::ports::ReadingSink;
use crate::cycle::Readings;

/// Adapter that logs every completed window as `uptime_s,key,value`.
#[derive(Default)]
pub struct LogReadingSink {
    published: u32,
}

impl LogReadingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Windows published so far.
    pub fn published(&self) -> u32 {
        self.published
    }

    /// Format one row.
    pub fn row(uptime_ms: u64, key: &str, value: f32) -> String {
        format!("{},{},{:.1}", uptime_ms / 1000, key, value)
    }

    /// Upload body for one window, e.g. `{"pm25":9.5,"pm10":14.0}`.
    pub fn payload(readings: &Readings) -> Result<String, serde_json::Error> {
        serde_json::to_string(readings)
    }
}

impl ReadingSink for LogReadingSink {
    fn publish(&mut self, uptime_ms: u64, readings: &Readings) {
        for (key, value) in readings.flat_values() {
            info!("DATA | {}", Self::row(uptime_ms, key, value));
        }
        match Self::payload(readings) {
            Ok(body) => info!("DATA | {}", body),
            Err(e) => warn!("LogSink: could not encode readings: {}", e),
        }
        self.published += 1;
    }
}
