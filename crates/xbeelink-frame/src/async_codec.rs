//! `tokio_util::codec` adapter for XBee frames.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::assembler::{Clock, FrameAssembler, MonotonicClock};
use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::FrameError;

/// Frame codec for `FramedRead`/`FramedWrite`.
///
/// Decoding runs every byte through a [`FrameAssembler`], so the resync and
/// checksum rules match the blocking [`FrameReader`](crate::FrameReader).
#[derive(Debug)]
pub struct XBeeCodec<C = MonotonicClock> {
    assembler: FrameAssembler<C>,
}

impl XBeeCodec {
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            assembler: FrameAssembler::with_config(config),
        }
    }
}

impl Default for XBeeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> XBeeCodec<C> {
    pub fn with_assembler(assembler: FrameAssembler<C>) -> Self {
        Self { assembler }
    }

    pub fn assembler(&self) -> &FrameAssembler<C> {
        &self.assembler
    }
}

impl<C: Clock> Decoder for XBeeCodec<C> {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let mut consumed = 0;
        let mut found = None;
        for &byte in src.iter() {
            consumed += 1;
            if let Some(frame) = self.assembler.push(byte) {
                found = Some(frame);
                break;
            }
        }
        src.advance(consumed);
        Ok(found)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if self.assembler.bytes_appended() > 0 => {
                self.assembler.reset();
                Err(FrameError::ConnectionClosed)
            }
            None => Ok(None),
        }
    }
}

impl<C: Clock> Encoder<Frame> for XBeeCodec<C> {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&item, dst)
    }
}
