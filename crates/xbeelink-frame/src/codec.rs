use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::api::ApiFrameType;
use crate::error::{FrameError, Result};

/// Start delimiter opening every frame.
pub const START_DELIMITER: u8 = 0x7E;

/// Frame header: delimiter (1) + length (2) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Largest frame-data region. The high length byte must be zero, so the
/// 2-byte length field carries at most 255.
pub const MAX_FRAME_DATA: usize = 255;

/// Frame ID meaning "no reply expected".
pub const NO_REPLY: u8 = 0;

/// One API frame: the frame-data region between the length field and the
/// checksum. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    /// Build a frame from its type, frame ID and type-specific body.
    pub fn new(frame_type: u8, frame_id: u8, body: &[u8]) -> Self {
        let mut data = BytesMut::with_capacity(2 + body.len());
        data.put_u8(frame_type);
        data.put_u8(frame_id);
        data.put_slice(body);
        Self {
            data: data.freeze(),
        }
    }

    /// Wrap a complete frame-data region (type byte first).
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// The full frame-data region.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The raw API type byte, if the frame is non-empty.
    pub fn type_byte(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// The API type, if known.
    pub fn api_type(&self) -> Option<ApiFrameType> {
        self.type_byte().and_then(ApiFrameType::from_byte)
    }

    /// The frame ID, for types that carry one.
    pub fn frame_id(&self) -> Option<u8> {
        match self.api_type() {
            Some(kind) if kind.carries_frame_id() => self.data.get(1).copied(),
            _ => None,
        }
    }

    /// Length of the frame-data region.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checksum byte trailing this frame on the wire.
    pub fn checksum(&self) -> u8 {
        checksum(&self.data)
    }

    /// The total wire size of this frame (header + data + checksum).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.data.len() + 1
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// `0xFF` minus the low byte of the sum of `data`.
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFF_u8.wrapping_sub(sum)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬───────────┬──────────────────────┬──────────┐
/// │ 0x7E      │ Length    │ Frame data           │ Checksum │
/// │ (1B)      │ (2B BE)   │ type, id, body       │ (1B)     │
/// └───────────┴───────────┴──────────────────────┴──────────┘
/// ```
///
/// No byte stuffing is performed.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let data = frame.data();
    if data.len() > MAX_FRAME_DATA {
        return Err(FrameError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_DATA,
        });
    }
    dst.reserve(frame.wire_size());
    dst.put_u8(START_DELIMITER);
    dst.put_u16(data.len() as u16);
    dst.put_slice(data);
    dst.put_u8(checksum(data));
    Ok(())
}

/// Configuration for frame assembly and stream reads.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Silence after which a start delimiter restarts framing mid-frame.
    /// Default: 1 second.
    pub resync_timeout: Duration,
    /// Read timeout for blocking operations on serial streams.
    pub read_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            resync_timeout: Duration::from_secs(1),
            read_timeout: Some(Duration::from_millis(100)),
        }
    }
}
