//! Application boundary.
//!
//! The port traits in [`ports`] are everything the core needs from the
//! outside world besides the serial link.  Adapters implementing them live
//! in [`crate::adapters`].

pub mod ports;
