//! Frame ID allocation and the pending-request table.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use xbeelink_frame::{Frame, NO_REPLY};

/// Callback receiving the response frame correlated with a request.
pub type ResponseCallback = Box<dyn FnMut(&Frame) + Send>;

pub(crate) type SharedCallback = Arc<Mutex<ResponseCallback>>;

/// Contiguous range of frame IDs handed out round-robin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdBand {
    first: u8,
    last: u8,
}

impl IdBand {
    /// A band from `first` to `last` inclusive. ID 0 is reserved for
    /// requests without a reply, so `first` must be at least 1.
    pub fn new(first: u8, last: u8) -> Option<Self> {
        (first != NO_REPLY && first <= last).then_some(Self { first, last })
    }

    pub fn first(&self) -> u8 {
        self.first
    }

    pub fn last(&self) -> u8 {
        self.last
    }

    pub fn contains(&self, id: u8) -> bool {
        (self.first..=self.last).contains(&id)
    }

    /// Number of IDs in the band.
    pub fn size(&self) -> usize {
        usize::from(self.last - self.first) + 1
    }
}

impl Default for IdBand {
    fn default() -> Self {
        Self { first: 1, last: 9 }
    }
}

impl fmt::Display for IdBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

struct Pending {
    ticket: u64,
    callback: Option<SharedCallback>,
}

/// What the router should do with a correlated response.
pub(crate) struct Correlated {
    pub(crate) callback: Option<SharedCallback>,
    /// Slot left occupied for further responses.
    pub(crate) kept: bool,
}

/// Pending requests indexed by frame ID, plus the round-robin counter.
pub(crate) struct Correlation {
    band: IdBand,
    next: u8,
    next_ticket: u64,
    slots: Vec<Option<Pending>>,
}

impl Correlation {
    pub(crate) fn new(band: IdBand) -> Self {
        Self {
            band,
            next: band.first,
            next_ticket: 1,
            slots: (0..=u8::MAX).map(|_| None).collect(),
        }
    }

    /// Next ID in the band. Occupied slots are not skipped.
    pub(crate) fn allocate(&mut self) -> u8 {
        let id = self.next;
        self.next = if id >= self.band.last {
            self.band.first
        } else {
            id + 1
        };
        id
    }

    /// Record a request under `id`, returning a ticket identifying it.
    pub(crate) fn insert(&mut self, id: u8, callback: Option<ResponseCallback>) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let slot = &mut self.slots[usize::from(id)];
        if let Some(previous) = slot.as_ref() {
            warn!(
                frame_id = id,
                previous_ticket = previous.ticket,
                "frame ID reused while a request is still pending"
            );
        }
        *slot = Some(Pending {
            ticket,
            callback: callback.map(|cb| Arc::new(Mutex::new(cb))),
        });
        ticket
    }

    /// Route a response for `id`, clearing the slot unless `keep` is set.
    pub(crate) fn correlate(&mut self, id: u8, keep: bool) -> Option<Correlated> {
        let slot = &mut self.slots[usize::from(id)];
        let Some(pending) = slot.as_ref() else {
            debug!(frame_id = id, "response without pending request, dropping");
            return None;
        };

        let callback = pending.callback.clone();
        if !keep {
            *slot = None;
        }
        Some(Correlated {
            callback,
            kept: keep,
        })
    }

    /// Clear the slot for `id` regardless of who holds it.
    pub(crate) fn release(&mut self, id: u8) -> bool {
        self.slots[usize::from(id)].take().is_some()
    }

    /// Clear the slot for `id` only if it still holds `ticket`.
    pub(crate) fn release_ticket(&mut self, id: u8, ticket: u64) -> bool {
        let slot = &mut self.slots[usize::from(id)];
        if slot.as_ref().is_some_and(|pending| pending.ticket == ticket) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_pending(&self, id: u8) -> bool {
        self.slots[usize::from(id)].is_some()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
