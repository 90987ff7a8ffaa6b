use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A connected serial byte channel implementing `Read` and `Write`.
///
/// This is the fundamental I/O type returned by transport operations.
/// On Unix it wraps either a configured tty device or one end of a
/// connected socket pair.
pub struct SerialStream {
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    #[cfg(unix)]
    Tty(std::fs::File),
    #[cfg(unix)]
    Socket(std::os::unix::net::UnixStream),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => {
                let n = file.read(buf)?;
                // With VMIN=0 a zero-length read is an expired VTIME, not EOF.
                if n == 0 && !buf.is_empty() && crate::serial::timed_reads(file)? {
                    return Err(std::io::Error::from(std::io::ErrorKind::TimedOut));
                }
                Ok(n)
            }
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => file.write(buf),
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => file.flush(),
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => stream.flush(),
        }
    }
}

impl SerialStream {
    /// Create a SerialStream from an opened and configured tty device.
    #[cfg(unix)]
    pub(crate) fn from_tty(file: std::fs::File) -> Self {
        Self {
            inner: SerialStreamInner::Tty(file),
        }
    }

    /// Create a SerialStream from a connected Unix stream socket.
    #[cfg(unix)]
    pub fn from_socket(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SerialStreamInner::Socket(stream),
        }
    }

    /// Create a connected pair of streams.
    ///
    /// Bytes written to one end are read from the other, which makes a pair
    /// a stand-in for a radio module attached to a serial port.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_socket(left), Self::from_socket(right)))
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Reads that time out fail with `TimedOut` or `WouldBlock`. On tty
    /// devices the timeout is rounded up to whole deciseconds (max 25.5s).
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => crate::serial::set_tty_read_timeout(file, timeout),
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => {
                stream.set_read_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Number of received bytes that can be read without blocking.
    pub fn bytes_to_read(&self) -> Result<usize> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => fionread(file),
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => fionread(stream),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => Ok(Self::from_tty(file.try_clone()?)),
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => Ok(Self::from_socket(stream.try_clone()?)),
        }
    }

    /// Discard bytes received but not yet read.
    ///
    /// Socket pairs have no driver queue to discard; this is a no-op for them.
    pub fn discard_input(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => crate::serial::flush_tty_input(file),
            #[cfg(unix)]
            SerialStreamInner::Socket(_) => Ok(()),
        }
    }
}

#[cfg(unix)]
fn fionread(fd: &impl std::os::fd::AsRawFd) -> Result<usize> {
    let mut available: libc::c_int = 0;
    // SAFETY: `available` is a valid writable c_int and the descriptor is open
    // for the lifetime of the borrow.
    let rc = unsafe {
        libc::ioctl(
            fd.as_raw_fd(),
            libc::FIONREAD,
            &mut available as *mut libc::c_int,
        )
    };
    if rc < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(available.max(0) as usize)
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(_) => {
                f.debug_struct("SerialStream").field("type", &"tty").finish()
            }
            #[cfg(unix)]
            SerialStreamInner::Socket(_) => f
                .debug_struct("SerialStream")
                .field("type", &"socket")
                .finish(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{ErrorKind, Read, Write};
    use std::time::Duration;

    use super::*;

    #[test]
    fn pair_carries_bytes_both_ways() {
        let (mut host, mut radio) = SerialStream::pair().unwrap();

        host.write_all(&[0x7E, 0x00, 0x02]).unwrap();
        let mut buf = [0u8; 3];
        radio.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x7E, 0x00, 0x02]);

        radio.write_all(b"ok").unwrap();
        let mut back = [0u8; 2];
        host.read_exact(&mut back).unwrap();
        assert_eq!(&back, b"ok");
    }

    #[test]
    fn bytes_to_read_reports_pending_input() {
        let (mut host, radio) = SerialStream::pair().unwrap();
        assert_eq!(radio.bytes_to_read().unwrap(), 0);

        host.write_all(&[1, 2, 3, 4, 5]).unwrap();
        host.flush().unwrap();
        assert_eq!(radio.bytes_to_read().unwrap(), 5);
    }

    #[test]
    fn read_timeout_expires() {
        let (_host, mut radio) = SerialStream::pair().unwrap();
        radio
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut buf = [0u8; 1];
        let err = radio.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::WouldBlock | ErrorKind::TimedOut
        ));
    }

    #[test]
    fn clone_shares_the_channel() {
        let (mut host, radio) = SerialStream::pair().unwrap();
        let mut reader = radio.try_clone().unwrap();

        host.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
        assert!(format!("{radio:?}").contains("socket"));
    }

    #[test]
    fn discard_input_is_noop_for_sockets() {
        let (_host, radio) = SerialStream::pair().unwrap();
        radio.discard_input().unwrap();
    }
}
