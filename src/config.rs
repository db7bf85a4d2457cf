//! Node configuration.
//!
//! Loaded once at boot from JSON and validated before anything is built.
//! Every field is required so a typo cannot silently fall back to a default.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::cycle::{MAX_INTERVAL_MINUTES, Mode};
use crate::error::Error;
use crate::pins::{SDS011_RX_GPIO, SDS011_TX_GPIO, SDS011_UART_PORT};

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    // --- Duty cycle ---
    /// Minutes between the starts of two measurement windows
    pub interval_minutes: u32,
    /// Mode applied at boot
    pub mode: Mode,
    /// Measurements averaged into one reported value
    pub window_samples: u32,

    // --- Link ---
    pub transport: TransportConfig,
}

/// Which serial channel the SDS011 sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
pub enum TransportConfig {
    /// Hardware UART (device builds only)
    Uart { port: u8, tx_gpio: i32, rx_gpio: i32 },
    /// In-process sensor model
    Simulated,
}

impl TransportConfig {
    /// The UART and pins the SDS011 is wired to on the airnode board.
    pub const fn board_uart() -> Self {
        Self::Uart {
            port: SDS011_UART_PORT,
            tx_gpio: SDS011_TX_GPIO,
            rx_gpio: SDS011_RX_GPIO,
        }
    }
}

impl Default for TransportConfig {
    /// The board UART on the device, the in-process model on the host.
    fn default() -> Self {
        if cfg!(target_os = "espidf") {
            Self::board_uart()
        } else {
            Self::Simulated
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 2,
            mode: Mode::Interval,
            window_samples: 10,
            transport: TransportConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parse and validate.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(text).map_err(|e| {
            warn!("Config: {}", e);
            Error::Config("malformed configuration JSON")
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(Error::Config("interval_minutes exceeds 1440"));
        }
        if self.window_samples == 0 {
            return Err(Error::Config("window_samples must be at least 1"));
        }
        if let TransportConfig::Uart { port, .. } = self.transport {
            if !matches!(port, 1 | 2) {
                return Err(Error::Config("transport.port must be 1 or 2"));
            }
        }
        Ok(())
    }
}
