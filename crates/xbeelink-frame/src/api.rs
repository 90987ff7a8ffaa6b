//! API frame type identifiers.
//!
//! The first byte of every frame's data names its type. Request types and
//! the responses correlated with them carry a frame ID in the second byte.

/// Known XBee API frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiFrameType {
    ModemStatus = 0x8A,
    AtCommand = 0x08,
    AtCommandQueue = 0x09,
    AtCommandResponse = 0x88,
    RemoteAtCommandRequest = 0x17,
    RemoteAtCommandResponse = 0x97,
    TransmitRequest = 0x10,
    ExplicitTransmit = 0x11,
    TransmitStatus = 0x8B,
    ReceivePacket = 0x90,
    ExplicitRxIndicator = 0x91,
    IoDataSampleRx = 0x92,
    SensorReadIndicator = 0x94,
    NodeIdentificationIndicator = 0x95,
}

impl ApiFrameType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x8A => Self::ModemStatus,
            0x08 => Self::AtCommand,
            0x09 => Self::AtCommandQueue,
            0x88 => Self::AtCommandResponse,
            0x17 => Self::RemoteAtCommandRequest,
            0x97 => Self::RemoteAtCommandResponse,
            0x10 => Self::TransmitRequest,
            0x11 => Self::ExplicitTransmit,
            0x8B => Self::TransmitStatus,
            0x90 => Self::ReceivePacket,
            0x91 => Self::ExplicitRxIndicator,
            0x92 => Self::IoDataSampleRx,
            0x94 => Self::SensorReadIndicator,
            0x95 => Self::NodeIdentificationIndicator,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns true if frames of this type carry a frame ID at byte 1.
    pub fn carries_frame_id(self) -> bool {
        matches!(
            self,
            Self::AtCommand
                | Self::AtCommandQueue
                | Self::AtCommandResponse
                | Self::RemoteAtCommandRequest
                | Self::RemoteAtCommandResponse
                | Self::TransmitRequest
                | Self::ExplicitTransmit
                | Self::TransmitStatus
        )
    }

    /// Returns a human-readable name for the frame type.
    pub fn name(self) -> &'static str {
        match self {
            Self::ModemStatus => "MODEM_STATUS",
            Self::AtCommand => "AT_COMMAND",
            Self::AtCommandQueue => "AT_COMMAND_QUEUE",
            Self::AtCommandResponse => "AT_COMMAND_RESPONSE",
            Self::RemoteAtCommandRequest => "REMOTE_AT_COMMAND",
            Self::RemoteAtCommandResponse => "REMOTE_AT_RESPONSE",
            Self::TransmitRequest => "TRANSMIT_REQUEST",
            Self::ExplicitTransmit => "EXPLICIT_TRANSMIT",
            Self::TransmitStatus => "TRANSMIT_STATUS",
            Self::ReceivePacket => "RECEIVE_PACKET",
            Self::ExplicitRxIndicator => "EXPLICIT_RX",
            Self::IoDataSampleRx => "IO_SAMPLE",
            Self::SensorReadIndicator => "SENSOR_READ",
            Self::NodeIdentificationIndicator => "NODE_IDENTIFICATION",
        }
    }
}

/// Returns a human-readable name for a raw type byte.
pub fn type_name(byte: u8) -> &'static str {
    ApiFrameType::from_byte(byte).map_or("UNKNOWN", ApiFrameType::name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_mapping_is_bijective_for_known_types() {
        for byte in 0..=u8::MAX {
            if let Some(kind) = ApiFrameType::from_byte(byte) {
                assert_eq!(kind.as_byte(), byte);
            }
        }
    }

    #[test]
    fn only_correlated_types_carry_frame_id() {
        assert!(ApiFrameType::RemoteAtCommandResponse.carries_frame_id());
        assert!(ApiFrameType::TransmitStatus.carries_frame_id());
        assert!(!ApiFrameType::IoDataSampleRx.carries_frame_id());
        assert!(!ApiFrameType::ReceivePacket.carries_frame_id());
        assert!(!ApiFrameType::ModemStatus.carries_frame_id());
    }

    #[test]
    fn unknown_type_name() {
        assert_eq!(type_name(0x92), "IO_SAMPLE");
        assert_eq!(type_name(0x42), "UNKNOWN");
    }
}
