/// Errors that can occur in radio operations.
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] xbeelink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xbeelink_frame::FrameError),

    /// A correlated response could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Command parameter or transmit data does not fit in one frame.
    #[error("payload of {size} bytes exceeds {max} byte limit")]
    ParameterTooLong { size: usize, max: usize },

    /// The receive path has stopped.
    #[error("radio disconnected: {0}")]
    Disconnected(String),
}

/// Errors from decoding the body of a received frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Frame is shorter than its type requires.
    #[error("{kind} frame truncated: need {needed} bytes, got {actual}")]
    Truncated {
        kind: &'static str,
        needed: usize,
        actual: usize,
    },

    /// Frame has a different API type than the decoder expects.
    #[error("expected {expected} frame, got type 0x{actual:02X}")]
    UnexpectedType { expected: &'static str, actual: u8 },
}

pub type Result<T> = std::result::Result<T, RadioError>;
