use std::fmt;

use parking_lot::Mutex;
use tracing::error;

use crate::domain::ListId;
use crate::platform::StoreCursor;
use crate::registry::{SlotAllocator, SlotError};

#[derive(Default)]
/// Open message-list cursors keyed by list id.
///
/// A cursor is always closed before its slot is released.
pub struct CursorRegistry {
    slots: Mutex<SlotAllocator<Box<dyn StoreCursor>>>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an open cursor.
    pub fn add(&self, cursor: Box<dyn StoreCursor>) -> ListId {
        ListId::new(self.slots.lock().create(|_| cursor))
    }

    /// Run `f` against a registered cursor while holding the registry lock.
    pub fn with_cursor<R>(
        &self,
        id: ListId,
        f: impl FnOnce(&mut dyn StoreCursor) -> R,
    ) -> Result<R, SlotError> {
        let mut slots = self.slots.lock();
        match slots.get_mut(id.slot()) {
            Ok(cursor) => Ok(f(&mut **cursor)),
            Err(err) => {
                error!(list = %id, %err, "trying to get an unknown list");
                Err(err)
            }
        }
    }

    pub fn contains(&self, id: ListId) -> bool {
        self.slots.lock().get(id.slot()).is_ok()
    }

    /// Close the cursor and release its slot.
    pub fn remove(&self, id: ListId) -> bool {
        let removed = self.slots.lock().destroy(id.slot());
        match removed {
            Ok(mut cursor) => {
                cursor.close();
                true
            }
            Err(err) => {
                error!(list = %id, %err, "trying to destroy an unknown list");
                false
            }
        }
    }

    /// Close and forget every registered cursor.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        for mut cursor in slots.drain() {
            cursor.close();
        }
    }

    /// Number of registered lists.
    pub fn live(&self) -> usize {
        self.slots.lock().live()
    }
}

impl Drop for CursorRegistry {
    fn drop(&mut self) {
        for mut cursor in self.slots.get_mut().drain() {
            cursor.close();
        }
    }
}

impl fmt::Debug for CursorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorRegistry")
            .field("live", &self.live())
            .finish()
    }
}
