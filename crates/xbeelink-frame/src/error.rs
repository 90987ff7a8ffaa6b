/// Errors that can occur during frame encoding and stream I/O.
///
/// Malformed inbound frames are not errors; the assembler drops them.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame data exceeds what the one-byte length field can carry.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached end of file.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
