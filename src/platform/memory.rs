//! In-memory message store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::domain::{DeliveryStateFilter, MessageBox, MessageFilter, Timestamp};
use crate::platform::row::{COLUMN_BODY, COLUMN_TYPE};
use crate::platform::{
    ContentStore, NewRow, SortOrder, StoreCursor, StoreError, StoreQuery, StoreTarget,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: i64,
    pub address: String,
    pub body: String,
    pub date: i64,
    /// Store box code (`1` inbox, `2` sent, anything else is foreign).
    pub kind: i64,
}

#[derive(Debug)]
struct State {
    rows: Vec<StoredRow>,
    next_id: i64,
}

#[derive(Debug)]
/// Message store kept in process memory.
///
/// Tracks how many cursors it handed out that were never closed.
pub struct MemoryStore {
    state: Mutex<State>,
    open_cursors: Arc<AtomicUsize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                rows: Vec::new(),
                next_id: 1,
            }),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row directly and return its id.
    pub fn insert_row(
        &self,
        kind: i64,
        address: impl Into<String>,
        body: impl Into<String>,
        date: Timestamp,
    ) -> i64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.rows.push(StoredRow {
            id,
            address: address.into(),
            body: body.into(),
            date: date.as_millis(),
            kind,
        });
        id
    }

    /// Id the next inserted row will get.
    pub fn set_next_id(&self, id: i64) {
        self.state.lock().next_id = id;
    }

    pub fn rows(&self) -> Vec<StoredRow> {
        self.state.lock().rows.clone()
    }

    /// Cursors handed out and not closed yet.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }
}

impl ContentStore for MemoryStore {
    fn query(&self, query: &StoreQuery) -> Result<Option<Box<dyn StoreCursor>>, StoreError> {
        let state = self.state.lock();
        let mut rows: Vec<StoredRow> = match query.target() {
            StoreTarget::Message(id) => state
                .rows
                .iter()
                .filter(|row| row.id == i64::from(id.value()))
                .cloned()
                .collect(),
            StoreTarget::All => state.rows.clone(),
            StoreTarget::Sentbox => state
                .rows
                .iter()
                .filter(|row| row.kind == MessageBox::Sent.code())
                .cloned()
                .collect(),
        };

        if let Some(filter) = query.filter() {
            rows.retain(|row| matches_filter(filter, row));
        }
        match query.sort_order() {
            Some(SortOrder::DateAscending) => rows.sort_by_key(|row| (row.date, row.id)),
            Some(SortOrder::DateDescending) => {
                rows.sort_by_key(|row| std::cmp::Reverse((row.date, row.id)))
            }
            None => {}
        }

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Box::new(MemoryCursor {
            rows,
            projection: query.projection(),
            position: None,
            closed: false,
            open_cursors: Arc::clone(&self.open_cursors),
        })))
    }

    fn insert(&self, target: StoreTarget, row: NewRow) -> Result<i64, StoreError> {
        match target {
            StoreTarget::Sentbox => Ok(self.insert_row(
                MessageBox::Sent.code(),
                row.address,
                row.body,
                row.date,
            )),
            other => Err(StoreError::UnsupportedTarget(other.uri())),
        }
    }

    fn delete(&self, target: StoreTarget) -> Result<usize, StoreError> {
        match target {
            StoreTarget::Message(id) => {
                let mut state = self.state.lock();
                let before = state.rows.len();
                state.rows.retain(|row| row.id != i64::from(id.value()));
                Ok(before - state.rows.len())
            }
            other => Err(StoreError::UnsupportedTarget(other.uri())),
        }
    }
}

fn matches_filter(filter: &MessageFilter, row: &StoredRow) -> bool {
    let after_start = filter
        .start()
        .is_none_or(|start| row.date >= start.as_millis());
    let before_end = filter.end().is_none_or(|end| row.date <= end.as_millis());
    let numbers = filter.number_list();
    let number_matches =
        numbers.is_empty() || numbers.iter().any(|number| number.raw() == row.address);
    let box_matches = match (filter.delivery_state(), MessageBox::from_code(row.kind)) {
        (_, None) => false,
        (DeliveryStateFilter::Any, Some(_)) => true,
        (DeliveryStateFilter::Sent, Some(message_box)) => message_box == MessageBox::Sent,
        (DeliveryStateFilter::Received, Some(message_box)) => message_box == MessageBox::Inbox,
    };
    after_start && before_end && number_matches && box_matches
}

#[derive(Debug)]
struct MemoryCursor {
    rows: Vec<StoredRow>,
    /// Columns the query asked for; anything else is unknown.
    projection: &'static [&'static str],
    position: Option<usize>,
    closed: bool,
    open_cursors: Arc<AtomicUsize>,
}

impl MemoryCursor {
    fn current(&self, column: &str) -> Result<&StoredRow, StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if !self.projection.iter().any(|known| *known == column) {
            return Err(StoreError::UnknownColumn(column.to_owned()));
        }
        self.position
            .and_then(|index| self.rows.get(index))
            .ok_or(StoreError::NoRow)
    }
}

impl StoreCursor for MemoryCursor {
    fn count(&self) -> usize {
        self.rows.len()
    }

    fn move_to_first(&mut self) -> bool {
        self.position = Some(0);
        !self.rows.is_empty()
    }

    fn move_to_next(&mut self) -> bool {
        let next = self.position.map_or(0, |index| index + 1);
        self.position = Some(next.min(self.rows.len()));
        next < self.rows.len()
    }

    fn get_long(&self, column: &str) -> Result<i64, StoreError> {
        let row = self.current(column)?;
        match column {
            "_id" => Ok(row.id),
            "date" => Ok(row.date),
            COLUMN_TYPE => Ok(row.kind),
            other => Err(StoreError::UnknownColumn(other.to_owned())),
        }
    }

    fn get_string(&self, column: &str) -> Result<String, StoreError> {
        let row = self.current(column)?;
        match column {
            "address" => Ok(row.address.clone()),
            COLUMN_BODY => Ok(row.body.clone()),
            other => self.get_long(other).map(|value| value.to_string()),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
