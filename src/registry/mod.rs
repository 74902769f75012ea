//! Registries handing out reusable integer handles.
//!
//! Live send operations and open message lists are few, so a linear scan over
//! a vector of optional slots is enough. A slot index is the handle: it stays
//! stable for the lifetime of its occupant and is recycled after `destroy`.

mod cursor;
mod tracker;

pub use cursor::CursorRegistry;
pub use tracker::{DeliveryTracker, Phase, SentRecord, TrackerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
/// Registry misuse. Never fatal; callers treat it as an unknown or expired handle.
pub enum SlotError {
    #[error("unknown slot {0}")]
    Unknown(usize),

    #[error("slot {0} is empty")]
    Empty(usize),
}

#[derive(Debug)]
/// Growable list of nullable slots that fills holes before growing.
pub struct SlotAllocator<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for SlotAllocator<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> SlotAllocator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a new occupant in the lowest empty slot, appending one if none is free.
    ///
    /// `factory` receives the slot index so the occupant can record its own id.
    pub fn create(&mut self, factory: impl FnOnce(usize) -> T) -> usize {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(factory(index));
                index
            }
            None => {
                let index = self.slots.len();
                self.slots.push(Some(factory(index)));
                index
            }
        }
    }

    pub fn get(&self, id: usize) -> Result<&T, SlotError> {
        self.slots
            .get(id)
            .ok_or(SlotError::Unknown(id))?
            .as_ref()
            .ok_or(SlotError::Empty(id))
    }

    pub fn get_mut(&mut self, id: usize) -> Result<&mut T, SlotError> {
        self.slots
            .get_mut(id)
            .ok_or(SlotError::Unknown(id))?
            .as_mut()
            .ok_or(SlotError::Empty(id))
    }

    /// Empty the slot and hand back its occupant.
    pub fn destroy(&mut self, id: usize) -> Result<T, SlotError> {
        self.slots
            .get_mut(id)
            .ok_or(SlotError::Unknown(id))?
            .take()
            .ok_or(SlotError::Empty(id))
    }

    /// Remove every occupant and forget all slots.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.slots.drain(..).flatten()
    }

    /// Number of occupied slots.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of slots ever allocated, occupied or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
