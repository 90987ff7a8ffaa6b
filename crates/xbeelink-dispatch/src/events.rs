//! Events published from the receive path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::decode::{AnalogSample, ModemStatus, ReceivePacket, TransmitStatus};

/// Decoded inbound traffic delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Digital port value from an I/O sample.
    DigitalStatus(u8),
    /// Analog readings from an I/O sample; published for every sample.
    AnalogStatus(AnalogSample),
    /// Application data from a ZigBee receive packet.
    DataReceived(ReceivePacket),
    ModemStatus(ModemStatus),
    TransmitStatus(TransmitStatus),
}

impl RadioEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DigitalStatus(_) => "digital_status",
            Self::AnalogStatus(_) => "analog_status",
            Self::DataReceived(_) => "data_received",
            Self::ModemStatus(_) => "modem_status",
            Self::TransmitStatus(_) => "transmit_status",
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&RadioEvent) + Send + Sync>;

/// Observer registry. Subscribers run synchronously, in registration order,
/// on the thread that routes frames.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, Subscriber)>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Deliver `event` to every subscriber. The registry is not locked while
    /// subscribers run, so they may subscribe or unsubscribe.
    pub(crate) fn publish(&self, event: &RadioEvent) {
        let snapshot: Vec<Subscriber> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in snapshot {
            subscriber(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn publish_reaches_subscribers_in_order() {
        let subscribers = Subscribers::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            subscribers.subscribe(Arc::new(move |event: &RadioEvent| {
                log.lock().unwrap().push((tag, event.name()));
            }));
        }
        subscribers.publish(&RadioEvent::DigitalStatus(0x04));

        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", "digital_status"), ("second", "digital_status")]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subscribers = Subscribers::default();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let id = subscribers.subscribe(Arc::new(move |_: &RadioEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        subscribers.publish(&RadioEvent::ModemStatus(ModemStatus::Associated));
        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        subscribers.publish(&RadioEvent::ModemStatus(ModemStatus::Associated));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(subscribers.len(), 0);
    }
}
