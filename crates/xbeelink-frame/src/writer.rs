use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, HEADER_SIZE, MAX_FRAME_DATA};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
///
/// Each frame is encoded into an internal buffer and written in full before
/// the call returns, so frames from one writer never interleave.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE + MAX_FRAME_DATA + 1),
        }
    }

    /// Write a complete frame (blocking).
    ///
    /// Any output still queued on the stream is flushed first.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf)?;

        self.flush()?;
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Build and write a frame from its parts.
    pub fn send(&mut self, frame_type: u8, frame_id: u8, body: &[u8]) -> Result<()> {
        self.write_frame(&Frame::new(frame_type, frame_id, body))
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::reader::FrameReader;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(0x08, 0x52, b"NJ").unwrap();

        assert_eq!(
            written(writer),
            vec![0x7E, 0x00, 0x04, 0x08, 0x52, 0x4E, 0x4A, 0x0D]
        );
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let frames = [
            Frame::new(0x08, 1, b"ID"),
            Frame::new(0x08, 2, b"SH"),
            Frame::new(0x10, 3, b"three"),
        ];
        for frame in &frames {
            writer.write_frame(frame).unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(written(writer)));
        for expected in &frames {
            assert_eq!(&reader.read_frame().unwrap(), expected);
        }
    }

    #[test]
    fn oversized_frame_rejected_before_writing() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let err = writer.send(0x10, 1, &[0u8; MAX_FRAME_DATA]).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 257, .. }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn flushes_before_and_after_write() {
        let sink = FlushCountingWriter::default();
        let flushes = Arc::clone(&sink.flushes);
        let mut writer = FrameWriter::new(sink);

        writer.send(0x08, 1, b"x").unwrap();

        assert_eq!(flushes.load(Ordering::SeqCst), 2);
        assert!(!writer.get_ref().data.is_empty());
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let mut writer = FrameWriter::new(FailOnceWriter::new(ErrorKind::Interrupted));
        writer.send(0x08, 5, b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data, Frame::new(0x08, 5, b"retry").to_bytes().unwrap());
    }

    #[test]
    fn handles_would_block_write_and_flush() {
        let mut writer = FrameWriter::new(FailOnceWriter::new(ErrorKind::WouldBlock));
        writer.send(0x08, 6, b"retry").unwrap();

        let inner = writer.into_inner();
        assert!(!inner.data.is_empty());
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(0x08, 1, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn io_error_propagates() {
        let mut writer = FrameWriter::new(BrokenWriter);
        let err = writer.send(0x08, 1, b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[derive(Default)]
    struct FlushCountingWriter {
        flushes: Arc<AtomicUsize>,
        data: Vec<u8>,
    }

    impl Write for FlushCountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailOnceWriter {
        kind: ErrorKind,
        write_failed: bool,
        flush_failed: bool,
        data: Vec<u8>,
    }

    impl FailOnceWriter {
        fn new(kind: ErrorKind) -> Self {
            Self {
                kind,
                write_failed: false,
                flush_failed: false,
                data: Vec::new(),
            }
        }
    }

    impl Write for FailOnceWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.write_failed {
                self.write_failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            // Short writes exercise the offset loop.
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_failed {
                self.flush_failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
