use parking_lot::Mutex;
use tracing::error;

use crate::domain::{ErrorCode, MessageId, Timestamp, TrackerId};
use crate::registry::SlotAllocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// One of the two completion lifecycles every outbound segment goes through.
pub enum Phase {
    Sent,
    Delivered,
}

impl Phase {
    fn index(self) -> usize {
        match self {
            Self::Sent => 0,
            Self::Delivered => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Identity of the sent-box copy, captured when the SENT phase succeeds.
pub struct SentRecord {
    /// `None` when saving the sent copy failed.
    pub message_id: Option<MessageId>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Bookkeeping for one send operation across all of its segments.
///
/// Invariant: a phase countdown only moves down, and the SENT countdown never
/// exceeds the DELIVERED one.
pub struct DeliveryTracker {
    id: TrackerId,
    remaining: [usize; 2],
    failing: [bool; 2],
    error: ErrorCode,
    sent: Option<SentRecord>,
}

impl DeliveryTracker {
    pub fn new(id: TrackerId, parts: usize) -> Self {
        Self {
            id,
            remaining: [parts; 2],
            failing: [false; 2],
            error: ErrorCode::NoError,
            sent: None,
        }
    }

    pub fn id(&self) -> TrackerId {
        self.id
    }

    /// Count one completed segment for `phase`.
    ///
    /// Returns `false` (and changes nothing) if the phase had no outstanding segment.
    pub fn decrement(&mut self, phase: Phase) -> bool {
        let slot = &mut self.remaining[phase.index()];
        if *slot == 0 {
            error!(tracker = %self.id, ?phase, "completion for a phase with no remaining parts");
            return false;
        }
        *slot -= 1;

        if self.remaining(Phase::Sent) > self.remaining(Phase::Delivered) {
            error!(tracker = %self.id, "delivered more parts than were sent");
        }
        true
    }

    pub fn remaining(&self, phase: Phase) -> usize {
        self.remaining[phase.index()]
    }

    pub fn has_remaining(&self, phase: Phase) -> bool {
        self.remaining(phase) != 0
    }

    /// Both phases have seen every segment.
    pub fn is_settled(&self) -> bool {
        !self.has_remaining(Phase::Sent) && !self.has_remaining(Phase::Delivered)
    }

    /// Sticky: once failing, a phase stays failing.
    pub fn mark_failed(&mut self, phase: Phase) {
        self.failing[phase.index()] = true;
    }

    pub fn is_failing(&self, phase: Phase) -> bool {
        self.failing[phase.index()]
    }

    /// Last error recorded for the SENT phase.
    pub fn error(&self) -> ErrorCode {
        self.error
    }

    pub fn set_error(&mut self, error: ErrorCode) {
        self.error = error;
    }

    pub fn sent_record(&self) -> Option<SentRecord> {
        self.sent
    }

    pub fn record_sent(&mut self, record: SentRecord) {
        self.sent = Some(record);
    }

    pub fn message_id(&self) -> Option<MessageId> {
        self.sent.and_then(|record| record.message_id)
    }

    /// SENT completion time, or the epoch while unset.
    pub fn message_timestamp(&self) -> Timestamp {
        self.sent.map(|record| record.timestamp).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
/// Live delivery trackers keyed by their slot index.
pub struct TrackerRegistry {
    slots: Mutex<SlotAllocator<DeliveryTracker>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a send split into `parts` segments.
    pub fn create(&self, parts: usize) -> TrackerId {
        let slot = self
            .slots
            .lock()
            .create(|slot| DeliveryTracker::new(TrackerId::new(slot), parts));
        TrackerId::new(slot)
    }

    /// Snapshot of a live tracker.
    pub fn get(&self, id: TrackerId) -> Option<DeliveryTracker> {
        self.update(id, |tracker| tracker.clone())
    }

    /// Run `f` against a live tracker while holding the registry lock.
    pub fn update<R>(&self, id: TrackerId, f: impl FnOnce(&mut DeliveryTracker) -> R) -> Option<R> {
        let mut slots = self.slots.lock();
        match slots.get_mut(id.slot()) {
            Ok(tracker) => Some(f(tracker)),
            Err(err) => {
                error!(tracker = %id, %err, "trying to get an unknown tracker");
                None
            }
        }
    }

    pub fn destroy(&self, id: TrackerId) -> bool {
        match self.slots.lock().destroy(id.slot()) {
            Ok(_) => true,
            Err(err) => {
                error!(tracker = %id, %err, "trying to destroy an unknown tracker");
                false
            }
        }
    }

    /// Destroy the tracker if both phases are complete. Returns whether it was destroyed.
    pub fn destroy_if_settled(&self, id: TrackerId) -> bool {
        let mut slots = self.slots.lock();
        let settled = slots
            .get(id.slot())
            .map(DeliveryTracker::is_settled)
            .unwrap_or(false);
        if settled {
            let _ = slots.destroy(id.slot());
        }
        settled
    }

    /// Number of send operations still being tracked.
    pub fn live(&self) -> usize {
        self.slots.lock().live()
    }
}
