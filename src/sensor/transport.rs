//! Transport abstraction for the sensor's serial link.
//!
//! Concrete implementations:
//! - UART at 9600 baud on the device (`adapters::uart`)
//! - an in-process SDS011 model on the host (`adapters::sim`)
//!
//! The driver is generic over `Transport`, so tests swap in a recording
//! mock without touching the driver.

/// Byte-oriented duplex channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf` without blocking.
    /// Returns 0 if no data is available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data`.  Returns the number of bytes accepted, which may be
    /// fewer than `data.len()`.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A transport that accepts every write and never has data.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = ();

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ()> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }
}
