//! Incremental frame assembly.
//!
//! [`FrameAssembler`] is fed one byte at a time and yields a [`Frame`] each
//! time a complete, checksum-valid frame has been seen. Bytes outside a frame
//! are skipped; a nonzero high length byte or a checksum mismatch drops the
//! frame in progress and returns to waiting for a delimiter.
//!
//! A start delimiter in the middle of a frame is only treated as a new frame
//! when the line has been silent for longer than the resync timeout. Inside
//! that window a `0x7E` is ordinary frame data, as the wire format has no
//! escaping.

use std::time::{Duration, Instant};

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::codec::{Frame, FrameConfig, MAX_FRAME_DATA, START_DELIMITER};

/// Source of monotonic time for the resync rule.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Where the assembler is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    AwaitDelimiter,
    LengthHigh,
    LengthLow,
    /// Frame-data bytes still expected, plus one for the checksum.
    Payload { remaining: usize },
}

/// Counters for dropped and completed frames.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames: u64,
    pub checksum_failures: u64,
    pub length_rejections: u64,
    pub resyncs: u64,
}

/// Byte-at-a-time frame state machine. Not thread-safe; one feeder only.
#[derive(Debug)]
pub struct FrameAssembler<C = MonotonicClock> {
    clock: C,
    resync_timeout: Duration,
    state: AssemblerState,
    buf: BytesMut,
    running: u8,
    position: usize,
    last_byte_at: Option<Instant>,
    stats: AssemblerStats,
}

impl FrameAssembler {
    /// Create an assembler with the default 1 second resync timeout.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create an assembler from explicit configuration.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self::with_clock(MonotonicClock, config.resync_timeout)
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> FrameAssembler<C> {
    /// Create an assembler reading time from `clock`.
    pub fn with_clock(clock: C, resync_timeout: Duration) -> Self {
        Self {
            clock,
            resync_timeout,
            state: AssemblerState::AwaitDelimiter,
            buf: BytesMut::with_capacity(MAX_FRAME_DATA),
            running: 0xFF,
            position: 0,
            last_byte_at: None,
            stats: AssemblerStats::default(),
        }
    }

    /// Feed one byte. Returns the frame it completes, if any.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        let now = self.clock.now();
        if byte == START_DELIMITER && self.position != 0 {
            if let Some(last) = self.last_byte_at {
                if now.saturating_duration_since(last) > self.resync_timeout {
                    debug!(
                        discarded = self.position,
                        "line idle past resync timeout, restarting frame"
                    );
                    self.stats.resyncs += 1;
                    self.reset();
                }
            }
        }
        self.last_byte_at = Some(now);

        match self.state {
            AssemblerState::AwaitDelimiter => {
                if byte == START_DELIMITER {
                    self.state = AssemblerState::LengthHigh;
                    self.position = 1;
                }
            }
            AssemblerState::LengthHigh => {
                if byte != 0 {
                    debug!(length_high = byte, "invalid frame length, dropping");
                    self.stats.length_rejections += 1;
                    self.reset();
                } else {
                    self.state = AssemblerState::LengthLow;
                    self.position += 1;
                }
            }
            AssemblerState::LengthLow => {
                let length = byte as usize;
                self.buf = BytesMut::with_capacity(length);
                self.running = 0xFF;
                self.state = AssemblerState::Payload {
                    remaining: length + 1,
                };
                self.position += 1;
            }
            AssemblerState::Payload { remaining } if remaining > 1 => {
                self.buf.put_u8(byte);
                self.running = self.running.wrapping_sub(byte);
                self.state = AssemblerState::Payload {
                    remaining: remaining - 1,
                };
                self.position += 1;
            }
            AssemblerState::Payload { .. } => {
                if byte == self.running {
                    let frame = Frame::from_data(self.buf.split().freeze());
                    self.stats.frames += 1;
                    self.reset();
                    return Some(frame);
                }
                debug!(
                    expected = self.running,
                    received = byte,
                    "frame checksum mismatch, dropping"
                );
                self.stats.checksum_failures += 1;
                self.reset();
            }
        }
        None
    }

    /// Feed a batch of bytes, collecting every frame they complete.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&byte| self.push(byte)).collect()
    }

    /// Discard any in-progress frame and wait for the next delimiter.
    pub fn reset(&mut self) {
        self.state = AssemblerState::AwaitDelimiter;
        self.buf.clear();
        self.running = 0xFF;
        self.position = 0;
    }

    /// Current position in the state machine.
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Bytes consumed so far by the in-progress frame, delimiter included.
    pub fn bytes_appended(&self) -> usize {
        self.position
    }

    /// Completed/dropped frame counters since creation.
    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Silence after which a mid-frame delimiter restarts framing.
    pub fn resync_timeout(&self) -> Duration {
        self.resync_timeout
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FakeClock {
        now: Cell<Instant>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Cell::new(Instant::now()),
            }
        }

        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    fn wire(frame: &Frame) -> Vec<u8> {
        frame.to_bytes().unwrap().to_vec()
    }

    #[test]
    fn assembles_every_length() {
        let mut assembler = FrameAssembler::new();
        for len in 0..=MAX_FRAME_DATA {
            let data: Vec<u8> = (0..len).map(|i| (i * 7 + len) as u8).collect();
            let frame = Frame::from_data(data.clone());

            let frames = assembler.extend(&wire(&frame));
            assert_eq!(frames.len(), 1, "length {len}");
            assert_eq!(frames[0].data(), data.as_slice(), "length {len}");
            assert_eq!(assembler.state(), AssemblerState::AwaitDelimiter);
        }
        assert_eq!(assembler.stats().frames, (MAX_FRAME_DATA + 1) as u64);
    }

    #[test]
    fn skips_noise_before_delimiter() {
        let mut assembler = FrameAssembler::new();
        let mut bytes = vec![0x00, 0x13, 0xFF, 0x42];
        bytes.extend(wire(&Frame::new(0x88, 1, b"ND\x00")));

        let frames = assembler.extend(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_id(), Some(1));
    }

    #[test]
    fn checksum_flip_drops_frame_and_recovers() {
        let good = Frame::new(0x97, 3, &[0u8; 14]);
        for bit in 0..8 {
            let mut assembler = FrameAssembler::new();
            let mut bad = wire(&good);
            let last = bad.len() - 1;
            bad[last] ^= 1 << bit;

            assert!(assembler.extend(&bad).is_empty());
            assert_eq!(assembler.state(), AssemblerState::AwaitDelimiter);
            assert_eq!(assembler.stats().checksum_failures, 1);

            let frames = assembler.extend(&wire(&good));
            assert_eq!(frames, vec![good.clone()]);
        }
    }

    #[test]
    fn nonzero_length_high_byte_resets() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(0x7E).is_none());
        assert_eq!(assembler.state(), AssemblerState::LengthHigh);

        assert!(assembler.push(0x01).is_none());
        assert_eq!(assembler.state(), AssemblerState::AwaitDelimiter);
        assert_eq!(assembler.bytes_appended(), 0);
        assert_eq!(assembler.stats().length_rejections, 1);

        let frame = Frame::new(0x08, 1, b"AI");
        assert_eq!(assembler.extend(&wire(&frame)), vec![frame]);
    }

    #[test]
    fn tracks_bytes_appended() {
        let mut assembler = FrameAssembler::new();
        let bytes = wire(&Frame::new(0x08, 1, b"AI"));

        for (i, byte) in bytes[..bytes.len() - 1].iter().enumerate() {
            assert!(assembler.push(*byte).is_none());
            assert_eq!(assembler.bytes_appended(), i + 1);
        }
        assert_eq!(
            assembler.state(),
            AssemblerState::Payload { remaining: 1 }
        );
    }

    #[test]
    fn delimiter_inside_window_is_data() {
        let clock = FakeClock::new();
        let mut assembler = FrameAssembler::with_clock(&clock, Duration::from_secs(1));
        let frame = Frame::new(0x90, 0x7E, &[0x7E, 0x01, 0x7E]);
        let bytes = wire(&frame);

        let mut out = Vec::new();
        for byte in bytes {
            clock.advance(Duration::from_millis(400));
            out.extend(assembler.push(byte));
        }
        assert_eq!(out, vec![frame]);
        assert_eq!(assembler.stats().resyncs, 0);
    }

    #[test]
    fn delimiter_after_silence_restarts_frame() {
        let clock = FakeClock::new();
        let mut assembler = FrameAssembler::with_clock(&clock, Duration::from_secs(1));
        let stale = wire(&Frame::new(0x88, 1, b"NDxx"));
        let fresh = Frame::new(0x88, 2, b"ND");

        // Half a frame, then the line goes quiet.
        assembler.extend(&stale[..5]);
        assert!(assembler.bytes_appended() > 0);
        clock.advance(Duration::from_millis(1500));

        let frames = assembler.extend(&wire(&fresh));
        assert_eq!(frames, vec![fresh]);
        assert_eq!(assembler.stats().resyncs, 1);
    }

    #[test]
    fn non_delimiter_after_silence_continues_frame() {
        let clock = FakeClock::new();
        let mut assembler = FrameAssembler::with_clock(&clock, Duration::from_secs(1));
        let frame = Frame::new(0x88, 1, b"ND");
        let bytes = wire(&frame);

        assembler.extend(&bytes[..4]);
        clock.advance(Duration::from_secs(5));
        assert_eq!(assembler.extend(&bytes[4..]), vec![frame]);
    }

    #[test]
    fn reset_discards_in_progress_frame() {
        let mut assembler = FrameAssembler::new();
        let frame = Frame::new(0x88, 1, b"ND");
        let bytes = wire(&frame);

        assembler.extend(&bytes[..5]);
        assembler.reset();
        assert_eq!(assembler.bytes_appended(), 0);
        assert!(assembler.extend(&bytes[5..]).is_empty());
        assert_eq!(assembler.extend(&bytes), vec![frame]);
    }

    #[test]
    fn back_to_back_frames() {
        let mut assembler = FrameAssembler::new();
        let a = Frame::new(0x88, 1, b"ID\x00");
        let b = Frame::from_data(vec![0x8A, 0x06]);
        let mut bytes = wire(&a);
        bytes.extend(wire(&b));

        assert_eq!(assembler.extend(&bytes), vec![a, b]);
    }
}
