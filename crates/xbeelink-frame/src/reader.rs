use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use xbeelink_transport::{SerialStream, TransportError};

use crate::assembler::{AssemblerStats, Clock, FrameAssembler, MonotonicClock};
use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 512;

/// Reads checksum-valid frames from any `Read` stream.
///
/// Bytes are fed through a [`FrameAssembler`], so noise and corrupt frames
/// are skipped rather than reported. Bytes read past the end of a frame stay
/// buffered for the next call.
pub struct FrameReader<T, C = MonotonicClock> {
    inner: T,
    pending: BytesMut,
    assembler: FrameAssembler<C>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let assembler = FrameAssembler::with_config(&config);
        Self::with_assembler(inner, assembler, config)
    }
}

impl<T: Read, C: Clock> FrameReader<T, C> {
    /// Create a reader around an existing assembler.
    pub fn with_assembler(inner: T, assembler: FrameAssembler<C>, config: FrameConfig) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(READ_CHUNK_SIZE),
            assembler,
            config,
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. Read
    /// timeouts surface as `FrameError::Io` with `TimedOut` or `WouldBlock`;
    /// a partially assembled frame survives them.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.take_buffered() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    /// Feed buffered bytes to the assembler until one completes a frame.
    fn take_buffered(&mut self) -> Option<Frame> {
        let mut consumed = 0;
        let mut found = None;
        for &byte in self.pending.iter() {
            consumed += 1;
            if let Some(frame) = self.assembler.push(byte) {
                found = Some(frame);
                break;
            }
        }
        self.pending.advance(consumed);
        found
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The assembler driving this reader.
    pub fn assembler(&self) -> &FrameAssembler<C> {
        &self.assembler
    }

    /// Completed and dropped frame counters.
    pub fn stats(&self) -> AssemblerStats {
        self.assembler.stats()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SerialStream> {
    /// Create a frame reader for `SerialStream` and apply read timeout from config.
    pub fn with_config_serial(inner: SerialStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

impl<C: Clock> FrameReader<SerialStream, C> {
    /// Assemble whatever the driver has already received, without blocking.
    ///
    /// Reads exactly the number of bytes the port reports as available and
    /// returns every frame they complete. Trailing partial frames stay in the
    /// assembler.
    pub fn drain_available(&mut self) -> Result<Vec<Frame>> {
        let available = self
            .inner
            .bytes_to_read()
            .map_err(transport_to_frame_error)?;
        if available > 0 {
            let start = self.pending.len();
            self.pending.resize(start + available, 0);
            let mut filled = start;
            while filled < self.pending.len() {
                match self.inner.read(&mut self.pending[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        self.pending.truncate(filled);
                        return Err(FrameError::Io(err));
                    }
                }
            }
            self.pending.truncate(filled);
        }

        let bytes = self.pending.split();
        Ok(self.assembler.extend(&bytes))
    }
}

fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        TransportError::Open { source, .. } | TransportError::Configure { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
