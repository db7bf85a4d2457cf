//! Peripheral assignments for the airnode board.
//!
//! Defaults only.  The configuration file can move the SDS011 to another
//! UART or pin pair without a rebuild.

// ---------------------------------------------------------------------------
// SDS011 particulate sensor (UART, 3.3 V logic, 5 V supply)
// ---------------------------------------------------------------------------

/// Fixed by the sensor.
pub const SDS011_BAUD: u32 = 9_600;
pub const SDS011_UART_PORT: u8 = 2;
/// ESP32 TX → sensor RXD.
pub const SDS011_TX_GPIO: i32 = 17;
/// Sensor TXD → ESP32 RX.
pub const SDS011_RX_GPIO: i32 = 16;
