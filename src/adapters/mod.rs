//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements   | Connects to                  |
//! |------------|--------------|------------------------------|
//! | `log_sink` | ReadingSink  | Serial log output            |
//! | `sim`      | Transport    | In-process SDS011 model      |
//! | `time`     | Clock        | ESP32 system timer / Instant |
//! | `uart`     | Transport    | ESP32 UART (device only)     |

pub mod log_sink;
pub mod sim;
pub mod time;
#[cfg(target_os = "espidf")]
pub mod uart;
