//! Typed views over received API frames.
//!
//! Offsets below index the frame-data region, so byte 0 is always the API
//! type. Each decoder checks the type byte and the minimum length for its
//! layout before reading any field.

use bytes::Bytes;
use xbeelink_frame::{ApiFrameType, Frame};

use crate::address::{Address16, Address64};
use crate::command::AtCommand;
use crate::error::DecodeError;

/// Analog channels carried by an I/O sample.
pub const ANALOG_CHANNELS: usize = 4;

/// Reported for analog channels absent from a sample.
pub const ANALOG_SENTINEL: i32 = -1;

/// Offset of the sample-set count in a 0x92 frame; the sample set follows
/// the 64-bit source, 16-bit source and options bytes.
const IO_SAMPLE_SET: usize = 12;

fn expect_type(frame: &Frame, expected: ApiFrameType) -> Result<&[u8], DecodeError> {
    let data = frame.data();
    match data.first() {
        Some(&byte) if byte == expected.as_byte() => Ok(data),
        Some(&byte) => Err(DecodeError::UnexpectedType {
            expected: expected.name(),
            actual: byte,
        }),
        None => Err(truncated(expected, 1, 0)),
    }
}

fn expect_len(data: &[u8], kind: ApiFrameType, needed: usize) -> Result<(), DecodeError> {
    if data.len() < needed {
        return Err(truncated(kind, needed, data.len()));
    }
    Ok(())
}

fn truncated(kind: ApiFrameType, needed: usize, actual: usize) -> DecodeError {
    DecodeError::Truncated {
        kind: kind.name(),
        needed,
        actual,
    }
}

fn be16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

/// The four analog channel readings of one I/O sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalogSample {
    pub channels: [Option<u16>; ANALOG_CHANNELS],
}

impl AnalogSample {
    /// Channel readings with absent channels as [`ANALOG_SENTINEL`].
    pub fn to_raw(&self) -> [i32; ANALOG_CHANNELS] {
        self.channels
            .map(|reading| reading.map_or(ANALOG_SENTINEL, i32::from))
    }

    pub fn channel(&self, index: usize) -> Option<u16> {
        self.channels.get(index).copied().flatten()
    }
}

/// ZigBee I/O data sample indicator (API type 0x92).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoSample {
    pub source64: Address64,
    pub source16: Address16,
    pub options: u8,
    pub digital_mask: u16,
    pub analog_mask: u8,
    /// Bytes 16-17, present only when the digital mask is nonzero.
    pub digital: Option<u16>,
    pub analog: AnalogSample,
}

impl IoSample {
    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let kind = ApiFrameType::IoDataSampleRx;
        let data = expect_type(frame, kind)?;
        expect_len(data, kind, IO_SAMPLE_SET)?;

        Self::from_sample_set(
            Address64::from_slice(&data[1..]).unwrap_or(Address64::COORDINATOR),
            Address16(be16(data, 9)),
            data[11],
            data,
            IO_SAMPLE_SET,
            kind,
        )
    }

    /// Decode the sample set returned by a remote `IS` (force sample)
    /// command, which has the same layout as the tail of a 0x92 frame.
    pub fn from_force_sample(response: &RemoteAtResponse) -> Result<Self, DecodeError> {
        Self::from_sample_set(
            response.source64,
            response.source16,
            0,
            &response.data,
            0,
            ApiFrameType::RemoteAtCommandResponse,
        )
    }

    /// Sample set at `base`: count (1), digital mask (2), analog mask (1),
    /// digital samples (2, only with a nonzero digital mask), then two bytes
    /// per analog channel whose mask bit is set.
    fn from_sample_set(
        source64: Address64,
        source16: Address16,
        options: u8,
        data: &[u8],
        base: usize,
        kind: ApiFrameType,
    ) -> Result<Self, DecodeError> {
        let samples_at = base + 4;
        expect_len(data, kind, samples_at)?;

        let digital_mask = be16(data, base + 1);
        let analog_mask = data[base + 3];

        let (digital, mut offset) = if digital_mask != 0 {
            expect_len(data, kind, samples_at + 2)?;
            (Some(be16(data, samples_at)), samples_at + 2)
        } else {
            (None, samples_at)
        };

        let mut analog = AnalogSample::default();
        for (channel, reading) in analog.channels.iter_mut().enumerate() {
            if analog_mask & (1 << channel) == 0 {
                continue;
            }
            expect_len(data, kind, offset + 2)?;
            *reading = Some(be16(data, offset));
            offset += 2;
        }

        Ok(Self {
            source64,
            source16,
            options,
            digital_mask,
            analog_mask,
            digital,
            analog,
        })
    }

    /// Digital port value published to digital-status subscribers (byte 17).
    pub fn digital_status(&self) -> Option<u8> {
        self.digital.map(|value| value as u8)
    }
}

/// Status byte of an AT command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    Error,
    InvalidCommand,
    InvalidParameter,
    TransmissionFailed,
    Other(u8),
}

impl CommandStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Ok,
            0x01 => Self::Error,
            0x02 => Self::InvalidCommand,
            0x03 => Self::InvalidParameter,
            0x04 => Self::TransmissionFailed,
            other => Self::Other(other),
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::InvalidCommand => "INVALID_COMMAND",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::TransmissionFailed => "TRANSMISSION_FAILED",
            Self::Other(_) => "UNKNOWN",
        }
    }
}

/// Local AT command response (API type 0x88).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtResponse {
    pub frame_id: u8,
    pub command: AtCommand,
    pub status: CommandStatus,
    pub data: Bytes,
}

impl AtResponse {
    const HEADER: usize = 5;

    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let kind = ApiFrameType::AtCommandResponse;
        let data = expect_type(frame, kind)?;
        expect_len(data, kind, Self::HEADER)?;

        Ok(Self {
            frame_id: data[1],
            command: AtCommand(be16(data, 2)),
            status: CommandStatus::from_byte(data[4]),
            data: Bytes::copy_from_slice(&data[Self::HEADER..]),
        })
    }
}

/// Remote AT command response (API type 0x97).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtResponse {
    pub frame_id: u8,
    pub source64: Address64,
    pub source16: Address16,
    pub command: AtCommand,
    pub status: CommandStatus,
    pub data: Bytes,
}

impl RemoteAtResponse {
    const HEADER: usize = 15;

    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let kind = ApiFrameType::RemoteAtCommandResponse;
        let data = expect_type(frame, kind)?;
        expect_len(data, kind, Self::HEADER)?;

        Ok(Self {
            frame_id: data[1],
            source64: Address64::from_slice(&data[2..]).unwrap_or(Address64::COORDINATOR),
            source16: Address16::from_slice(&data[10..]).unwrap_or(Address16::UNKNOWN),
            command: AtCommand(be16(data, 12)),
            status: CommandStatus::from_byte(data[14]),
            data: Bytes::copy_from_slice(&data[Self::HEADER..]),
        })
    }
}

/// Command field and data of either kind of AT response.
///
/// Returns `None` for frames that are not AT responses or are too short to
/// carry a command field.
pub fn response_command(frame: &Frame) -> Option<(AtCommand, &[u8])> {
    let data = frame.data();
    let (command_at, body_at) = match frame.api_type()? {
        ApiFrameType::AtCommandResponse => (2, AtResponse::HEADER),
        ApiFrameType::RemoteAtCommandResponse => (12, RemoteAtResponse::HEADER),
        _ => return None,
    };
    let command = AtCommand::from_slice(data.get(command_at..)?)?;
    Some((command, data.get(body_at..).unwrap_or_default()))
}

/// MAC-level delivery outcome of a transmit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Success,
    ClearChannelAssessmentFailure,
    InvalidDestinationEndpoint,
    NetworkAckFailure,
    NotJoinedToNetwork,
    SelfAddressed,
    AddressNotFound,
    RouteNotFound,
    Other(u8),
}

impl DeliveryStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Success,
            0x02 => Self::ClearChannelAssessmentFailure,
            0x15 => Self::InvalidDestinationEndpoint,
            0x21 => Self::NetworkAckFailure,
            0x22 => Self::NotJoinedToNetwork,
            0x23 => Self::SelfAddressed,
            0x24 => Self::AddressNotFound,
            0x25 => Self::RouteNotFound,
            other => Self::Other(other),
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Route discovery overhead reported with a transmit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
    NoDiscoveryOverhead,
    AddressDiscovery,
    RouteDiscovery,
    AddressAndRouteDiscovery,
    Other(u8),
}

impl DiscoveryStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::NoDiscoveryOverhead,
            0x01 => Self::AddressDiscovery,
            0x02 => Self::RouteDiscovery,
            0x03 => Self::AddressAndRouteDiscovery,
            other => Self::Other(other),
        }
    }
}

/// ZigBee transmit status (API type 0x8B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitStatus {
    pub frame_id: u8,
    pub destination16: Address16,
    pub retries: u8,
    pub delivery: DeliveryStatus,
    pub discovery: DiscoveryStatus,
}

impl TransmitStatus {
    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let kind = ApiFrameType::TransmitStatus;
        let data = expect_type(frame, kind)?;
        expect_len(data, kind, 7)?;

        Ok(Self {
            frame_id: data[1],
            destination16: Address16(be16(data, 2)),
            retries: data[4],
            delivery: DeliveryStatus::from_byte(data[5]),
            discovery: DiscoveryStatus::from_byte(data[6]),
        })
    }
}

/// ZigBee receive packet (API type 0x90).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivePacket {
    pub source64: Address64,
    pub source16: Address16,
    pub options: u8,
    pub data: Bytes,
}

impl ReceivePacket {
    /// Type, 64-bit source, 16-bit source, options.
    pub const HEADER: usize = 12;

    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let kind = ApiFrameType::ReceivePacket;
        let data = expect_type(frame, kind)?;
        expect_len(data, kind, Self::HEADER)?;

        Ok(Self {
            source64: Address64::from_slice(&data[1..]).unwrap_or(Address64::COORDINATOR),
            source16: Address16(be16(data, 9)),
            options: data[11],
            data: Bytes::copy_from_slice(&data[Self::HEADER..]),
        })
    }

    /// Whether the packet was sent as a broadcast.
    pub fn is_broadcast(&self) -> bool {
        self.options & 0x02 != 0
    }
}

/// Modem status (API type 0x8A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemStatus {
    HardwareReset,
    WatchdogReset,
    Associated,
    Disassociated,
    CoordinatorStarted,
    Other(u8),
}

impl ModemStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::HardwareReset,
            0x01 => Self::WatchdogReset,
            0x02 => Self::Associated,
            0x03 => Self::Disassociated,
            0x06 => Self::CoordinatorStarted,
            other => Self::Other(other),
        }
    }

    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let kind = ApiFrameType::ModemStatus;
        let data = expect_type(frame, kind)?;
        expect_len(data, kind, 2)?;
        Ok(Self::from_byte(data[1]))
    }
}

/// One node reported in a node discovery (`ND`) response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredNode {
    pub address16: Address16,
    pub address64: Address64,
    pub identifier: String,
}

impl DiscoveredNode {
    /// Parse the leading fields of an `ND` response body: network address,
    /// serial number and NUL-terminated node identifier. Trailing fields
    /// vary by firmware and are ignored.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let address16 = Address16::from_slice(body)?;
        let address64 = Address64::from_slice(body.get(2..)?)?;
        let rest = body.get(10..).unwrap_or_default();
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Some(Self {
            address16,
            address64,
            identifier: String::from_utf8_lossy(&rest[..end]).into_owned(),
        })
    }
}
