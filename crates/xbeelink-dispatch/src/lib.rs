//! Command dispatch and frame routing for XBee radios in API mode.
//!
//! This is the layer applications talk to. Build requests, send them
//! fire-and-forget, with a callback, or synchronously, and subscribe to the
//! unsolicited traffic (I/O samples, received data, modem status) the
//! module produces.
//!
//! A [`Radio`] ties a [`Dispatcher`] to a serial port and runs the receive
//! thread that feeds inbound frames to [`Dispatcher::route`].

pub mod address;
pub mod command;
pub mod decode;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod pending;
#[cfg(unix)]
pub mod radio;
mod router;

pub use address::{Address16, Address64, Destination, ParseAddressError};
pub use command::{
    ApiRequest, AtCommand, AtRequest, ParseCommandError, RemoteAtRequest, TransmitRequest,
    DIGITAL_OUTPUT_HIGH, DIGITAL_OUTPUT_LOW, REMOTE_APPLY_CHANGES,
};
pub use decode::{
    response_command, AnalogSample, AtResponse, CommandStatus, DeliveryStatus, DiscoveredNode,
    DiscoveryStatus, IoSample, ModemStatus, ReceivePacket, RemoteAtResponse, TransmitStatus,
    ANALOG_CHANNELS, ANALOG_SENTINEL,
};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{DecodeError, RadioError, Result};
pub use events::{RadioEvent, SubscriptionId};
pub use pending::{IdBand, ResponseCallback};
#[cfg(unix)]
pub use radio::{Radio, RadioConfig};
