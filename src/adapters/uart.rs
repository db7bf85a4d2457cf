//! SDS011 serial link over an ESP32 hardware UART.
//!
//! 9600 baud, 8N1, no flow control.  Reads never block: an empty RX FIFO
//! reads as zero bytes.

use esp_idf_hal::delay::NON_BLOCK;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{Uart, UartDriver, config::Config};
use esp_idf_hal::units::Hertz;
use esp_idf_sys::EspError;

use crate::pins::SDS011_BAUD;
use crate::sensor::Transport;

pub struct UartTransport<'d> {
    driver: UartDriver<'d>,
}

impl<'d> UartTransport<'d> {
    /// Claim `uart` with TX/RX on the given GPIO numbers.
    pub fn new<U: Uart>(
        uart: impl Peripheral<P = U> + 'd,
        tx_gpio: i32,
        rx_gpio: i32,
    ) -> Result<Self, EspError> {
        // SAFETY: the pin numbers come from validated configuration and are
        // not claimed by any other driver in this firmware.
        let (tx, rx) = unsafe { (AnyIOPin::new(tx_gpio), AnyIOPin::new(rx_gpio)) };

        let config = Config::default().baudrate(Hertz(SDS011_BAUD));
        let driver = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;
        Ok(Self { driver })
    }
}

impl Transport for UartTransport<'_> {
    type Error = EspError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EspError> {
        self.driver.read(buf, NON_BLOCK)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, EspError> {
        self.driver.write(data)
    }
}
