//! Serial byte channel for XBee radio modules.
//!
//! Provides the duplex byte stream the rest of xbeelink is built on:
//! - Serial devices configured through termios (Linux/macOS)
//! - Connected socket pairs standing in for a radio in tests and simulators
//!
//! This is the lowest layer of xbeelink. Everything else builds on top of
//! the [`SerialStream`] type provided here.

pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod serial;

pub use error::{Result, TransportError};
pub use stream::SerialStream;

#[cfg(unix)]
pub use serial::{DataBits, Parity, SerialConfig, SerialPort, StopBits};
