use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};
use xbeelink_frame::{Frame, FrameWriter, MAX_FRAME_DATA, NO_REPLY};

use crate::address::Destination;
use crate::command::{
    ApiRequest, AtCommand, AtRequest, RemoteAtRequest, TransmitRequest, DIGITAL_OUTPUT_HIGH,
    DIGITAL_OUTPUT_LOW,
};
use crate::decode::{
    AnalogSample, AtResponse, IoSample, ReceivePacket, RemoteAtResponse, TransmitStatus,
};
use crate::error::{RadioError, Result};
use crate::events::{RadioEvent, SubscriptionId, Subscribers};
use crate::pending::{Correlation, IdBand, ResponseCallback};

/// Dispatcher behavior settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Frame IDs handed out to requests expecting a reply. Default: 1..=9.
    pub id_band: IdBand,
    /// How long synchronous sends wait for their response. Default: 500ms.
    pub sync_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            id_band: IdBand::default(),
            sync_timeout: Duration::from_millis(500),
        }
    }
}

/// Sends requests and correlates responses by frame ID.
///
/// Any number of threads may send. Responses are fed in through
/// [`route`](Self::route) by the single thread that reads the serial port;
/// callbacks and subscribers run on that thread, so they must not call the
/// synchronous senders (the response they would wait for cannot be routed
/// until they return).
pub struct Dispatcher<W> {
    writer: Mutex<FrameWriter<W>>,
    table: Mutex<Correlation>,
    subscribers: Subscribers,
    config: DispatcherConfig,
}

impl<W: Write + Send> Dispatcher<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, DispatcherConfig::default())
    }

    pub fn with_config(writer: W, config: DispatcherConfig) -> Self {
        Self {
            writer: Mutex::new(FrameWriter::new(writer)),
            table: Mutex::new(Correlation::new(config.id_band)),
            subscribers: Subscribers::default(),
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Next frame ID from the configured band. Never 0.
    pub fn allocate_id(&self) -> u8 {
        lock(&self.table).allocate()
    }

    /// Fire-and-forget: frame ID 0, the module sends no response.
    pub fn send<R: ApiRequest + ?Sized>(&self, request: &R) -> Result<()> {
        check_size(request)?;
        self.write(&request.to_frame(NO_REPLY))
    }

    /// Send with a callback for the correlated response. Returns the frame
    /// ID immediately; the callback runs later on the receive thread.
    pub fn send_async<R, F>(&self, request: &R, callback: F) -> Result<u8>
    where
        R: ApiRequest + ?Sized,
        F: FnMut(&Frame) + Send + 'static,
    {
        self.send_tracked(request, Some(Box::new(callback)))
            .map(|(id, _)| id)
    }

    /// Send and wait up to the configured sync timeout for the response.
    ///
    /// Returns `Ok(None)` when nothing arrives in time. Must not be called
    /// from a response callback or subscriber: those run on the receive
    /// thread, so the response could never be routed and this always times out.
    pub fn send_sync<R: ApiRequest + ?Sized>(&self, request: &R) -> Result<Option<Frame>> {
        self.send_sync_timeout(request, self.config.sync_timeout)
    }

    /// [`send_sync`](Self::send_sync) with an explicit timeout.
    ///
    /// On timeout the slot is released if it still belongs to this request,
    /// so a late response is dropped instead of reaching a newer request.
    pub fn send_sync_timeout<R: ApiRequest + ?Sized>(
        &self,
        request: &R,
        timeout: Duration,
    ) -> Result<Option<Frame>> {
        let (tx, rx) = mpsc::sync_channel::<Frame>(1);
        let callback: ResponseCallback = Box::new(move |frame: &Frame| {
            // Only the first response is awaited; extras are dropped.
            let _ = tx.try_send(frame.clone());
        });
        let (id, ticket) = self.send_tracked(request, Some(callback))?;

        let response = match rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) => {
                debug!(frame_id = id, ?timeout, "no response before timeout");
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        };
        lock(&self.table).release_ticket(id, ticket);
        Ok(response)
    }

    /// Clear a pending slot, e.g. to end a node discovery.
    pub fn release(&self, id: u8) -> bool {
        lock(&self.table).release(id)
    }

    pub fn is_pending(&self, id: u8) -> bool {
        lock(&self.table).is_pending(id)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.table).pending_count()
    }

    fn send_tracked<R: ApiRequest + ?Sized>(
        &self,
        request: &R,
        callback: Option<ResponseCallback>,
    ) -> Result<(u8, u64)> {
        check_size(request)?;
        let (id, ticket) = {
            let mut table = lock(&self.table);
            let id = table.allocate();
            (id, table.insert(id, callback))
        };

        let frame = request.to_frame(id);
        if let Err(err) = self.write(&frame) {
            lock(&self.table).release_ticket(id, ticket);
            return Err(err);
        }
        trace!(
            frame_id = id,
            frame_type = request.frame_type().name(),
            command = ?request.at_command(),
            "request sent"
        );
        Ok((id, ticket))
    }

    fn write(&self, frame: &Frame) -> Result<()> {
        lock(&self.writer).write_frame(frame)?;
        Ok(())
    }

    /// Remote AT command with a callback for the response.
    pub fn send_remote_at<F>(
        &self,
        destination: Destination,
        command: AtCommand,
        parameter: &[u8],
        callback: F,
    ) -> Result<u8>
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        let request = RemoteAtRequest::set(destination, command, parameter);
        self.send_async(&request, callback)
    }

    pub fn send_remote_at_sync(
        &self,
        destination: Destination,
        command: AtCommand,
        parameter: &[u8],
    ) -> Result<Option<RemoteAtResponse>> {
        let request = RemoteAtRequest::set(destination, command, parameter);
        match self.send_sync(&request)? {
            Some(frame) => Ok(Some(RemoteAtResponse::decode(&frame)?)),
            None => Ok(None),
        }
    }

    /// Local AT command with a callback for the response.
    pub fn send_at<F>(&self, command: AtCommand, parameter: &[u8], callback: F) -> Result<u8>
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        self.send_async(&AtRequest::set(command, parameter), callback)
    }

    pub fn send_at_sync(&self, command: AtCommand, parameter: &[u8]) -> Result<Option<AtResponse>> {
        match self.send_sync(&AtRequest::set(command, parameter))? {
            Some(frame) => Ok(Some(AtResponse::decode(&frame)?)),
            None => Ok(None),
        }
    }

    /// Transmit application data. The callback receives the transmit status
    /// frame.
    pub fn transmit<F>(&self, destination: Destination, data: &[u8], callback: F) -> Result<u8>
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        self.send_async(&TransmitRequest::new(destination, data), callback)
    }

    /// Transmit and wait for the delivery report.
    pub fn transmit_sync(
        &self,
        destination: Destination,
        data: &[u8],
    ) -> Result<Option<TransmitStatus>> {
        match self.send_sync(&TransmitRequest::new(destination, data))? {
            Some(frame) => Ok(Some(TransmitStatus::decode(&frame)?)),
            None => Ok(None),
        }
    }

    /// Drive a remote digital output high or low through its `Dn`
    /// configuration command. No response is requested.
    pub fn set_digital_output(
        &self,
        destination: Destination,
        pin: AtCommand,
        high: bool,
    ) -> Result<()> {
        let level = if high {
            DIGITAL_OUTPUT_HIGH
        } else {
            DIGITAL_OUTPUT_LOW
        };
        self.send(&RemoteAtRequest::set(destination, pin, [level]))
    }

    /// Ask a remote node for an immediate I/O sample.
    pub fn force_sample(&self, destination: Destination) -> Result<Option<IoSample>> {
        match self.send_remote_at_sync(destination, AtCommand::FORCE_SAMPLE, &[])? {
            Some(response) => Ok(Some(IoSample::from_force_sample(&response)?)),
            None => Ok(None),
        }
    }
}

impl<W> Dispatcher<W> {
    /// Register an observer for every decoded event.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&RadioEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(Arc::new(subscriber))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn on_digital_status<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let RadioEvent::DigitalStatus(status) = event {
                handler(*status);
            }
        })
    }

    pub fn on_analog_status<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&AnalogSample) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let RadioEvent::AnalogStatus(sample) = event {
                handler(sample);
            }
        })
    }

    pub fn on_data_received<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ReceivePacket) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let RadioEvent::DataReceived(packet) = event {
                handler(packet);
            }
        })
    }

    pub(crate) fn publish(&self, event: RadioEvent) {
        self.subscribers.publish(&event);
    }

    /// Hand a correlated response to its request's callback. The table lock
    /// is released before the callback runs.
    pub(crate) fn correlate(&self, frame: &Frame, keep: bool) {
        let Some(id) = frame.frame_id() else {
            return;
        };
        if id == NO_REPLY {
            return;
        }

        let correlated = lock(&self.table).correlate(id, keep);
        let Some(correlated) = correlated else {
            return;
        };
        trace!(frame_id = id, kept = correlated.kept, "response correlated");
        if let Some(callback) = correlated.callback {
            let mut callback = lock(&callback);
            (*callback)(frame);
        }
    }
}

fn check_size<R: ApiRequest + ?Sized>(request: &R) -> Result<()> {
    let size = request.frame_len();
    if size > MAX_FRAME_DATA {
        return Err(RadioError::ParameterTooLong {
            size,
            max: MAX_FRAME_DATA,
        });
    }
    Ok(())
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
