//! Inbound frame classification.

use tracing::debug;
use xbeelink_frame::{type_name, ApiFrameType, Frame};

use crate::command::AtCommand;
use crate::decode::{response_command, IoSample, ModemStatus, ReceivePacket, TransmitStatus};
use crate::dispatcher::Dispatcher;
use crate::events::RadioEvent;

impl<W> Dispatcher<W> {
    /// Classify a received frame and deliver it.
    ///
    /// AT and remote AT responses and transmit status reports go to the
    /// callback of the request they answer. I/O samples, receive packets,
    /// transmit status and modem status are published to subscribers.
    /// Frames that are truncated, uncorrelated or of an unhandled type are
    /// dropped.
    pub fn route(&self, frame: &Frame) {
        let Some(kind) = frame.api_type() else {
            debug!(
                frame_type = frame.type_byte(),
                name = frame.type_byte().map_or("EMPTY", type_name),
                "unknown frame type, dropping"
            );
            return;
        };

        match kind {
            ApiFrameType::IoDataSampleRx => match IoSample::decode(frame) {
                Ok(sample) => {
                    if let Some(status) = sample.digital_status() {
                        self.publish(RadioEvent::DigitalStatus(status));
                    }
                    self.publish(RadioEvent::AnalogStatus(sample.analog));
                }
                Err(err) => debug!(%err, "dropping I/O sample"),
            },
            ApiFrameType::AtCommandResponse | ApiFrameType::RemoteAtCommandResponse => {
                let Some((command, body)) = response_command(frame) else {
                    debug!(frame_type = kind.name(), len = frame.len(), "truncated response, dropping");
                    return;
                };
                // Node discovery answers once per node; the slot stays open
                // until a response without node data or an explicit release.
                let keep = command == AtCommand::NODE_DISCOVER && !body.is_empty();
                self.correlate(frame, keep);
            }
            ApiFrameType::TransmitStatus => match TransmitStatus::decode(frame) {
                Ok(status) => {
                    self.correlate(frame, false);
                    self.publish(RadioEvent::TransmitStatus(status));
                }
                Err(err) => debug!(%err, "dropping transmit status"),
            },
            ApiFrameType::ReceivePacket => match ReceivePacket::decode(frame) {
                Ok(packet) => self.publish(RadioEvent::DataReceived(packet)),
                Err(err) => debug!(%err, "dropping receive packet"),
            },
            ApiFrameType::ModemStatus => match ModemStatus::decode(frame) {
                Ok(status) => self.publish(RadioEvent::ModemStatus(status)),
                Err(err) => debug!(%err, "dropping modem status"),
            },
            other => debug!(frame_type = other.name(), "unhandled frame type, dropping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::address::{Address16, Destination};
    use crate::command::{AtRequest, RemoteAtRequest};
    use crate::decode::{AnalogSample, DeliveryStatus};

    const NODE: [u8; 8] = [0x00, 0x13, 0xA2, 0x00, 0x40, 0x86, 0xDA, 0x07];

    fn dispatcher() -> Dispatcher<Vec<u8>> {
        Dispatcher::new(Vec::new())
    }

    fn events(dispatcher: &Dispatcher<Vec<u8>>) -> Arc<Mutex<Vec<RadioEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        dispatcher.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        log
    }

    fn io_frame(digital_mask: u16, analog_mask: u8, samples: &[u8]) -> Frame {
        let mut data = vec![0x92];
        data.extend_from_slice(&NODE);
        data.extend_from_slice(&[0x7D, 0x84, 0x01, 0x01]);
        data.extend_from_slice(&digital_mask.to_be_bytes());
        data.push(analog_mask);
        data.extend_from_slice(samples);
        Frame::from_data(data)
    }

    fn remote_response(id: u8, command: &[u8; 2], data: &[u8]) -> Frame {
        let mut body = NODE.to_vec();
        body.extend_from_slice(&[0x7D, 0x84]);
        body.extend_from_slice(command);
        body.push(0x00);
        body.extend_from_slice(data);
        Frame::new(0x97, id, &body)
    }

    #[test]
    fn io_sample_without_digital_publishes_analog_only() {
        let dispatcher = dispatcher();
        let log = events(&dispatcher);

        dispatcher.route(&io_frame(0x0000, 0b0001, &[0x02, 0x25]));

        let mut expected = AnalogSample::default();
        expected.channels[0] = Some(0x0225);
        assert_eq!(*log.lock().unwrap(), vec![RadioEvent::AnalogStatus(expected)]);
    }

    #[test]
    fn io_sample_with_digital_publishes_byte_17() {
        let dispatcher = dispatcher();
        let log = events(&dispatcher);

        dispatcher.route(&io_frame(0x0006, 0x00, &[0x00, 0x04]));

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                RadioEvent::DigitalStatus(0x04),
                RadioEvent::AnalogStatus(AnalogSample::default()),
            ]
        );
    }

    #[test]
    fn discovery_slot_survives_repeated_responses() {
        let dispatcher = dispatcher();
        let nodes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&nodes);
        let id = dispatcher
            .send_at(AtCommand::NODE_DISCOVER, &[], move |frame| {
                sink.lock().unwrap().push(frame.data()[5..].to_vec());
            })
            .unwrap();

        dispatcher.route(&Frame::new(0x88, id, b"ND\x00first"));
        assert!(dispatcher.is_pending(id));
        dispatcher.route(&Frame::new(0x88, id, b"ND\x00second"));
        assert!(dispatcher.is_pending(id));

        assert_eq!(
            *nodes.lock().unwrap(),
            vec![b"first".to_vec(), b"second".to_vec()]
        );

        // A response without node data ends the discovery.
        dispatcher.route(&Frame::new(0x88, id, b"ND\x00"));
        assert!(!dispatcher.is_pending(id));
        assert_eq!(nodes.lock().unwrap().len(), 3);
    }

    #[test]
    fn remote_discovery_reads_command_after_addresses() {
        let dispatcher = dispatcher();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let request = RemoteAtRequest::query(Destination::coordinator(), AtCommand::NODE_DISCOVER);
        let id = dispatcher
            .send_async(&request, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        dispatcher.route(&remote_response(id, b"ND", b"node-a"));
        dispatcher.route(&remote_response(id, b"ND", b"node-b"));
        assert!(dispatcher.is_pending(id));
        assert!(dispatcher.release(id));
        dispatcher.route(&remote_response(id, b"ND", b"late"));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn ordinary_response_clears_slot() {
        let dispatcher = dispatcher();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let request = RemoteAtRequest::query(Destination::coordinator(), AtCommand::FORCE_SAMPLE);
        let id = dispatcher
            .send_async(&request, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        dispatcher.route(&remote_response(id, b"IS", &[0x01]));
        dispatcher.route(&remote_response(id, b"IS", &[0x01]));

        assert!(!dispatcher.is_pending(id));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transmit_status_reaches_callback_and_subscribers() {
        let dispatcher = dispatcher();
        let log = events(&dispatcher);
        let status = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&status);

        let id = dispatcher
            .transmit(Destination::broadcast(), b"ping", move |frame| {
                *sink.lock().unwrap() = Some(TransmitStatus::decode(frame).unwrap());
            })
            .unwrap();
        assert!(dispatcher.is_pending(id));

        dispatcher.route(&Frame::new(0x8B, id, &[0xFF, 0xFE, 0x00, 0x00, 0x00]));

        let received = status.lock().unwrap().expect("callback should fire");
        assert_eq!(received.frame_id, id);
        assert_eq!(received.delivery, DeliveryStatus::Success);
        assert_eq!(received.destination16, Address16::UNKNOWN);
        assert!(!dispatcher.is_pending(id));
        assert_eq!(
            *log.lock().unwrap(),
            vec![RadioEvent::TransmitStatus(received)]
        );
    }

    #[test]
    fn receive_packet_published_without_header() {
        let dispatcher = dispatcher();
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&payloads);
        dispatcher.on_data_received(move |packet| {
            sink.lock().unwrap().push(packet.data.to_vec());
        });

        let mut data = vec![0x90];
        data.extend_from_slice(&NODE);
        data.extend_from_slice(&[0x7D, 0x84, 0x01]);
        data.extend_from_slice(b"temp=21");
        dispatcher.route(&Frame::from_data(data));

        assert_eq!(*payloads.lock().unwrap(), vec![b"temp=21".to_vec()]);
    }

    #[test]
    fn uncorrelated_and_unknown_frames_are_dropped() {
        let dispatcher = dispatcher();
        let log = events(&dispatcher);

        dispatcher.route(&Frame::new(0x88, 5, b"NI\x00"));
        dispatcher.route(&Frame::from_data(vec![0x42, 0x01, 0x02]));
        dispatcher.route(&Frame::from_data(Vec::new()));
        dispatcher.route(&Frame::from_data(vec![0x92, 0x00]));
        dispatcher.route(&Frame::from_data(vec![0x95, 0x00]));

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn modem_status_published() {
        let dispatcher = dispatcher();
        let log = events(&dispatcher);

        dispatcher.route(&Frame::from_data(vec![0x8A, 0x00]));

        assert_eq!(
            *log.lock().unwrap(),
            vec![RadioEvent::ModemStatus(ModemStatus::HardwareReset)]
        );
    }

    #[test]
    fn callback_may_send_without_deadlock() {
        let dispatcher = Arc::new(dispatcher());
        let inner = Arc::clone(&dispatcher);
        let id = dispatcher
            .send_async(&AtRequest::query(AtCommand::NETWORK_ADDRESS), move |_| {
                inner
                    .send(&AtRequest::query(AtCommand::WRITE))
                    .expect("send from callback");
            })
            .unwrap();

        dispatcher.route(&Frame::new(0x88, id, b"MY\x00\x00\x00"));
        assert_eq!(dispatcher.pending_count(), 0);
    }
}
