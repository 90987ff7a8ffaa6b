//! XBee API-mode framing over a serial byte stream.
//!
//! Every frame on the wire is:
//! - A start delimiter (`0x7E`)
//! - A 2-byte big-endian length of the frame data
//! - The frame data (API type byte, frame ID where the type has one, body)
//! - A checksum byte: `0xFF` minus the low byte of the frame-data sum
//!
//! Inbound bytes are fed to a [`FrameAssembler`], which silently drops
//! malformed frames and resynchronizes on the next delimiter.

pub mod api;
pub mod assembler;
#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use api::{type_name, ApiFrameType};
pub use assembler::{AssemblerState, AssemblerStats, Clock, FrameAssembler, MonotonicClock};
#[cfg(feature = "async")]
pub use async_codec::XBeeCodec;
pub use codec::{
    checksum, encode_frame, Frame, FrameConfig, HEADER_SIZE, MAX_FRAME_DATA, NO_REPLY,
    START_DELIMITER,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
