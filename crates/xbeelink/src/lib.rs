//! Talk to XBee ZigBee radios in API mode.
//!
//! xbeelink frames and unframes the module's API protocol over a serial
//! port, correlates commands with their responses, and decodes the
//! unsolicited traffic (I/O samples, received data, modem status).
//!
//! # Crate Structure
//!
//! - [`transport`]: serial byte stream (termios devices, socket pairs)
//! - [`frame`]: API frame serialization and checksum-validated assembly
//! - [`dispatch`]: command dispatch, frame routing, typed decoding (behind `dispatch` feature)

/// Re-export transport types.
pub mod transport {
    pub use xbeelink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xbeelink_frame::*;
}

/// Re-export dispatch types (requires `dispatch` feature).
#[cfg(feature = "dispatch")]
pub mod dispatch {
    pub use xbeelink_dispatch::*;
}
