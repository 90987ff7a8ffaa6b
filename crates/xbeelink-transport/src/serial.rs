use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SerialStream;

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// Line settings for a serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub path: PathBuf,
    /// Line speed. Default: 9600 (XBee factory setting).
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Read timeout applied after opening. `None` blocks until a byte arrives.
    pub read_timeout: Option<Duration>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/ttyUSB0"),
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Some(Duration::from_millis(100)),
        }
    }
}

impl SerialConfig {
    /// Default line settings for the given device path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Serial device transport.
///
/// Opens a tty in raw mode (no echo, no line editing, no flow control) with
/// the requested line settings. Stale input queued by the driver is
/// discarded so the frame assembler starts on a clean stream.
pub struct SerialPort;

impl SerialPort {
    /// Open and configure a serial device.
    pub fn open(config: &SerialConfig) -> Result<SerialStream> {
        let speed = baud_to_speed(config.baud_rate)?;
        let path = config.path.clone();

        // O_NONBLOCK keeps open() from waiting on carrier detect; it is
        // cleared again once the device is configured.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        configure(&file, config, speed).map_err(|source| TransportError::Configure {
            path: path.clone(),
            source,
        })?;
        clear_nonblocking(&file).map_err(|source| TransportError::Configure {
            path: path.clone(),
            source,
        })?;

        let stream = SerialStream::from_tty(file);
        stream.set_read_timeout(config.read_timeout)?;
        stream.discard_input()?;

        info!(?path, baud = config.baud_rate, "opened serial port");
        Ok(stream)
    }

    /// Transport name for diagnostics.
    pub fn transport_name() -> &'static str {
        "serial-tty"
    }
}

fn configure(file: &File, config: &SerialConfig, speed: libc::speed_t) -> std::io::Result<()> {
    let mut tio = get_termios(file)?;

    // SAFETY: `tio` is a valid, initialized termios structure.
    unsafe { libc::cfmakeraw(&mut tio) };

    tio.c_cflag &= !libc::CSIZE;
    tio.c_cflag |= match config.data_bits {
        DataBits::Seven => libc::CS7,
        DataBits::Eight => libc::CS8,
    };

    match config.parity {
        Parity::None => tio.c_cflag &= !(libc::PARENB | libc::PARODD),
        Parity::Even => {
            tio.c_cflag |= libc::PARENB;
            tio.c_cflag &= !libc::PARODD;
        }
        Parity::Odd => tio.c_cflag |= libc::PARENB | libc::PARODD,
    }

    match config.stop_bits {
        StopBits::One => tio.c_cflag &= !libc::CSTOPB,
        StopBits::Two => tio.c_cflag |= libc::CSTOPB,
    }

    tio.c_cflag &= !libc::CRTSCTS;
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;

    // SAFETY: `tio` is a valid termios structure and `speed` a termios speed constant.
    let rc = unsafe { libc::cfsetispeed(&mut tio, speed) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: as above.
    let rc = unsafe { libc::cfsetospeed(&mut tio, speed) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }

    set_termios(file, &tio)
}

fn clear_nonblocking(file: &File) -> std::io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: `fd` is an open descriptor owned by `file`.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: as above.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

fn get_termios(file: &File) -> std::io::Result<libc::termios> {
    let mut tio = std::mem::MaybeUninit::<libc::termios>::uninit();
    // SAFETY: `tio` points to writable storage of the right size; tcgetattr
    // fully initializes it on success.
    let rc = unsafe { libc::tcgetattr(file.as_raw_fd(), tio.as_mut_ptr()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: tcgetattr returned success.
    Ok(unsafe { tio.assume_init() })
}

fn set_termios(file: &File, tio: &libc::termios) -> std::io::Result<()> {
    // SAFETY: `tio` is a valid termios structure and the descriptor is open.
    let rc = unsafe { libc::tcsetattr(file.as_raw_fd(), libc::TCSANOW, tio) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Apply a read timeout through VMIN/VTIME.
pub(crate) fn set_tty_read_timeout(file: &File, timeout: Option<Duration>) -> Result<()> {
    let mut tio = get_termios(file)?;
    match timeout {
        Some(timeout) => {
            let deciseconds = timeout.as_millis().div_ceil(100).clamp(1, 255);
            tio.c_cc[libc::VMIN] = 0;
            tio.c_cc[libc::VTIME] = deciseconds as libc::cc_t;
        }
        None => {
            tio.c_cc[libc::VMIN] = 1;
            tio.c_cc[libc::VTIME] = 0;
        }
    }
    set_termios(file, &tio)?;
    debug!(?timeout, "applied tty read timeout");
    Ok(())
}

/// Whether reads on this tty return early with zero bytes (VMIN=0).
pub(crate) fn timed_reads(file: &File) -> std::io::Result<bool> {
    Ok(get_termios(file)?.c_cc[libc::VMIN] == 0)
}

pub(crate) fn flush_tty_input(file: &File) -> Result<()> {
    // SAFETY: the descriptor is open for the lifetime of the borrow.
    let rc = unsafe { libc::tcflush(file.as_raw_fd(), libc::TCIFLUSH) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

fn baud_to_speed(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        other => return Err(TransportError::UnsupportedBaudRate(other)),
    };
    Ok(speed)
}
