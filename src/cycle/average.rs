//! Running mean over PM readings.

use serde::Serialize;

use crate::protocol::Measurement;

/// One PM2.5/PM10 pair in µg/m³.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Readings {
    pub pm25: f32,
    pub pm10: f32,
}

impl Readings {
    /// Flat key/value view handed to upload collaborators.
    pub fn flat_values(&self) -> [(&'static str, f32); 2] {
        [("pm25", self.pm25), ("pm10", self.pm10)]
    }
}

impl From<&Measurement> for Readings {
    fn from(m: &Measurement) -> Self {
        Self {
            pm25: m.pm25(),
            pm10: m.pm10(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunningAverage {
    count: u32,
    pm25_sum: f64,
    pm10_sum: f64,
}

impl RunningAverage {
    pub fn add(&mut self, r: Readings) {
        self.count += 1;
        self.pm25_sum += f64::from(r.pm25);
        self.pm10_sum += f64::from(r.pm10);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// `None` until the first sample.
    pub fn mean(&self) -> Option<Readings> {
        if self.count == 0 {
            return None;
        }
        let n = f64::from(self.count);
        Some(Readings {
            pm25: (self.pm25_sum / n) as f32,
            pm10: (self.pm10_sum / n) as f32,
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
