//! A dispatcher bound to a serial port, with its receive thread.

use std::io::ErrorKind;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, trace, warn};
use xbeelink_frame::{AssemblerStats, FrameConfig, FrameError, FrameReader};
use xbeelink_transport::{SerialConfig, SerialPort, SerialStream, TransportError};

use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::error::{RadioError, Result};

/// Everything needed to bring up a radio.
#[derive(Debug, Clone, Default)]
pub struct RadioConfig {
    pub serial: SerialConfig,
    pub dispatcher: DispatcherConfig,
    pub frame: FrameConfig,
}

impl RadioConfig {
    /// Default settings for the device at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            serial: SerialConfig::new(path),
            ..Self::default()
        }
    }
}

/// A running radio: a [`Dispatcher`] writing to the port, plus one thread
/// reading frames from it and routing them.
///
/// Dereferences to the dispatcher, so requests are sent directly on the
/// radio. Dropping it stops the receive thread.
pub struct Radio {
    dispatcher: Arc<Dispatcher<SerialStream>>,
    stop: Arc<AtomicBool>,
    receiver: Option<JoinHandle<AssemblerStats>>,
}

impl Radio {
    /// Open the configured serial port and start receiving.
    pub fn open(config: &RadioConfig) -> Result<Self> {
        let stream = SerialPort::open(&config.serial)?;
        info!(path = ?config.serial.path, "radio opened");
        Self::from_stream(stream, config.clone())
    }

    /// Start a radio over an already connected stream.
    pub fn from_stream(stream: SerialStream, config: RadioConfig) -> Result<Self> {
        let reader = FrameReader::with_config_serial(stream.try_clone()?, config.frame)?;
        let dispatcher = Arc::new(Dispatcher::with_config(stream, config.dispatcher));
        let stop = Arc::new(AtomicBool::new(false));

        let receiver = thread::Builder::new()
            .name("xbee-receive".to_string())
            .spawn({
                let dispatcher = Arc::clone(&dispatcher);
                let stop = Arc::clone(&stop);
                move || receive_loop(reader, &dispatcher, &stop)
            })
            .map_err(TransportError::Io)?;

        Ok(Self {
            dispatcher,
            stop,
            receiver: Some(receiver),
        })
    }

    /// Shared handle to the dispatcher, usable from other threads.
    pub fn dispatcher(&self) -> &Arc<Dispatcher<SerialStream>> {
        &self.dispatcher
    }

    /// True while the receive thread is running.
    pub fn is_receiving(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Fails with [`RadioError::Disconnected`] once the receive thread has
    /// exited; responses can no longer arrive after that.
    pub fn ensure_receiving(&self) -> Result<()> {
        if self.is_receiving() {
            Ok(())
        } else {
            Err(RadioError::Disconnected(
                "receive thread is not running".to_string(),
            ))
        }
    }

    /// Stop the receive thread and wait for it. Returns the assembler
    /// counters on the first call, `None` afterwards.
    ///
    /// The thread notices the stop request on its next read timeout, so this
    /// blocks for up to one `FrameConfig::read_timeout`.
    pub fn shutdown(&mut self) -> Option<AssemblerStats> {
        self.stop.store(true, Ordering::Release);
        let handle = self.receiver.take()?;
        match handle.join() {
            Ok(stats) => {
                info!(
                    frames = stats.frames,
                    checksum_failures = stats.checksum_failures,
                    "radio closed"
                );
                Some(stats)
            }
            Err(_) => {
                warn!("receive thread panicked");
                None
            }
        }
    }
}

impl Deref for Radio {
    type Target = Dispatcher<SerialStream>;

    fn deref(&self) -> &Self::Target {
        &self.dispatcher
    }
}

impl Drop for Radio {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn receive_loop(
    mut reader: FrameReader<SerialStream>,
    dispatcher: &Dispatcher<SerialStream>,
    stop: &AtomicBool,
) -> AssemblerStats {
    while !stop.load(Ordering::Acquire) {
        match reader.read_frame() {
            Ok(frame) => {
                trace!(len = frame.len(), "frame received");
                dispatcher.route(&frame);
            }
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(FrameError::ConnectionClosed) => {
                info!("serial stream closed, receive thread exiting");
                break;
            }
            Err(err) => {
                warn!(%err, "receive failed, receive thread exiting");
                break;
            }
        }
    }
    reader.stats()
}
