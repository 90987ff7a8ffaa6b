//! AT command codes and outbound request builders.

use std::fmt;
use std::str::FromStr;

use xbeelink_frame::{ApiFrameType, Frame, MAX_FRAME_DATA};

use crate::address::Destination;

/// Two-character AT command, stored as its big-endian ASCII code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtCommand(pub u16);

impl AtCommand {
    // Addressing
    pub const SERIAL_NUMBER_HIGH: Self = Self::from_ascii(*b"SH");
    pub const SERIAL_NUMBER_LOW: Self = Self::from_ascii(*b"SL");
    pub const NETWORK_ADDRESS: Self = Self::from_ascii(*b"MY");
    pub const NODE_IDENTIFIER: Self = Self::from_ascii(*b"NI");
    // Networking
    pub const NODE_DISCOVER: Self = Self::from_ascii(*b"ND");
    pub const NODE_JOIN_TIME: Self = Self::from_ascii(*b"NJ");
    pub const OPERATING_CHANNEL: Self = Self::from_ascii(*b"CH");
    pub const ASSOCIATION_INDICATION: Self = Self::from_ascii(*b"AI");
    // RF
    pub const RECEIVED_SIGNAL_STRENGTH: Self = Self::from_ascii(*b"DB");
    pub const POWER_LEVEL: Self = Self::from_ascii(*b"PL");
    // I/O
    pub const FORCE_SAMPLE: Self = Self::from_ascii(*b"IS");
    pub const IO_SAMPLE_RATE: Self = Self::from_ascii(*b"IR");
    pub const DIO0_CONFIGURATION: Self = Self::from_ascii(*b"D0");
    pub const DIO1_CONFIGURATION: Self = Self::from_ascii(*b"D1");
    pub const DIO2_CONFIGURATION: Self = Self::from_ascii(*b"D2");
    pub const DIO3_CONFIGURATION: Self = Self::from_ascii(*b"D3");
    pub const DIO4_CONFIGURATION: Self = Self::from_ascii(*b"D4");
    // Special
    pub const WRITE: Self = Self::from_ascii(*b"WR");
    pub const APPLY_CHANGES: Self = Self::from_ascii(*b"AC");
    pub const SOFTWARE_RESET: Self = Self::from_ascii(*b"FR");
    pub const FIRMWARE_VERSION: Self = Self::from_ascii(*b"VR");

    pub const fn from_ascii(code: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(code))
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let code: [u8; 2] = bytes.get(..2)?.try_into().ok()?;
        Some(Self::from_ascii(code))
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [hi, lo] = self.to_bytes();
        if hi.is_ascii_graphic() && lo.is_ascii_graphic() {
            write!(f, "{}{}", hi as char, lo as char)
        } else {
            write!(f, "0x{:04X}", self.0)
        }
    }
}

impl FromStr for AtCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [hi, lo] if hi.is_ascii_graphic() && lo.is_ascii_graphic() => {
                Ok(Self::from_ascii([hi.to_ascii_uppercase(), lo.to_ascii_uppercase()]))
            }
            _ => Err(ParseCommandError(s.to_string())),
        }
    }
}

/// Error parsing an AT command mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid AT command {0:?}: expected two ASCII characters")]
pub struct ParseCommandError(String);

/// Remote AT option bit: apply the change immediately on the remote node.
pub const REMOTE_APPLY_CHANGES: u8 = 0x02;

/// Digital output parameter values for `Dn` configuration commands.
pub const DIGITAL_OUTPUT_HIGH: u8 = 0x05;
pub const DIGITAL_OUTPUT_LOW: u8 = 0x04;

/// An outbound API request that can be framed with a frame ID.
pub trait ApiRequest {
    fn frame_type(&self) -> ApiFrameType;

    /// Append everything after the frame ID.
    fn write_body(&self, body: &mut Vec<u8>);

    /// AT command carried by the request, if any.
    fn at_command(&self) -> Option<AtCommand> {
        None
    }

    /// Frame-data length once framed (type and ID bytes included).
    fn frame_len(&self) -> usize {
        let mut body = Vec::new();
        self.write_body(&mut body);
        2 + body.len()
    }

    fn to_frame(&self, frame_id: u8) -> Frame {
        let mut body = Vec::with_capacity(MAX_FRAME_DATA);
        self.write_body(&mut body);
        Frame::new(self.frame_type().as_byte(), frame_id, &body)
    }
}

/// Local AT command (API type 0x08).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRequest {
    pub command: AtCommand,
    pub parameter: Vec<u8>,
}

impl AtRequest {
    /// Query form: no parameter.
    pub fn query(command: AtCommand) -> Self {
        Self {
            command,
            parameter: Vec::new(),
        }
    }

    pub fn set(command: AtCommand, parameter: impl Into<Vec<u8>>) -> Self {
        Self {
            command,
            parameter: parameter.into(),
        }
    }
}

impl ApiRequest for AtRequest {
    fn frame_type(&self) -> ApiFrameType {
        ApiFrameType::AtCommand
    }

    fn write_body(&self, body: &mut Vec<u8>) {
        body.extend_from_slice(&self.command.to_bytes());
        body.extend_from_slice(&self.parameter);
    }

    fn at_command(&self) -> Option<AtCommand> {
        Some(self.command)
    }
}

/// Remote AT command (API type 0x17).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtRequest {
    pub destination: Destination,
    pub options: u8,
    pub command: AtCommand,
    pub parameter: Vec<u8>,
}

impl RemoteAtRequest {
    pub fn query(destination: Destination, command: AtCommand) -> Self {
        Self::set(destination, command, Vec::new())
    }

    pub fn set(destination: Destination, command: AtCommand, parameter: impl Into<Vec<u8>>) -> Self {
        Self {
            destination,
            options: REMOTE_APPLY_CHANGES,
            command,
            parameter: parameter.into(),
        }
    }
}

impl ApiRequest for RemoteAtRequest {
    fn frame_type(&self) -> ApiFrameType {
        ApiFrameType::RemoteAtCommandRequest
    }

    fn write_body(&self, body: &mut Vec<u8>) {
        body.extend_from_slice(&self.destination.to_bytes());
        body.push(self.options);
        body.extend_from_slice(&self.command.to_bytes());
        body.extend_from_slice(&self.parameter);
    }

    fn at_command(&self) -> Option<AtCommand> {
        Some(self.command)
    }
}

/// ZigBee transmit request (API type 0x10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitRequest {
    pub destination: Destination,
    /// Maximum hops for broadcasts; 0 uses the module's `NH` setting.
    pub broadcast_radius: u8,
    pub options: u8,
    pub data: Vec<u8>,
}

impl TransmitRequest {
    pub fn new(destination: Destination, data: impl Into<Vec<u8>>) -> Self {
        Self {
            destination,
            broadcast_radius: 0,
            options: 0,
            data: data.into(),
        }
    }
}

impl ApiRequest for TransmitRequest {
    fn frame_type(&self) -> ApiFrameType {
        ApiFrameType::TransmitRequest
    }

    fn write_body(&self, body: &mut Vec<u8>) {
        body.extend_from_slice(&self.destination.to_bytes());
        body.push(self.broadcast_radius);
        body.push(self.options);
        body.extend_from_slice(&self.data);
    }
}
