//! Platform layer: the telephony stack, the message store, and the host as seen
//! from the bridge, plus their wire-format details (result codes, selection
//! clauses, row decoding).

use std::error::Error as StdError;

use crate::domain::{Notification, RawPhoneNumber};

mod broadcast;
pub mod memory;
mod query;
mod result_code;
mod row;

pub use broadcast::{
    Broadcast, BroadcastExtras, CompletionExtras, CompletionTarget, CompletionToken,
    CompletionTokens, IncomingSms,
};
pub use query::{NewRow, Selection, SortOrder, StoreQuery, StoreTarget};
pub use result_code::{KnownResultCode, ResultCode};
pub use row::RowError;
pub(crate) use row::{read_message, read_message_id};

#[derive(Debug, thiserror::Error)]
/// Failures of the platform's SMS send API.
pub enum PlatformError {
    /// The platform refused to queue the message.
    #[error("send rejected: {0}")]
    Rejected(String),

    /// Broadcast receiver (un)registration failed.
    #[error("receiver registration failed: {0}")]
    Registration(String),

    /// Any other failure raised by the platform.
    #[error("platform failure: {0}")]
    Other(#[source] Box<dyn StdError + Send + Sync>),
}

#[derive(Debug, thiserror::Error)]
/// Failures of the platform's message store.
pub enum StoreError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("cursor is not positioned on a row")]
    NoRow,

    #[error("cursor is closed")]
    Closed,

    #[error("unsupported target: {0}")]
    UnsupportedTarget(String),

    /// Any other failure raised by the provider.
    #[error("provider failure: {0}")]
    Provider(#[source] Box<dyn StdError + Send + Sync>),
}

/// The platform's SMS send API.
///
/// Completions arrive later as [`Broadcast::Completion`] built from the targets
/// passed here, one per segment and phase.
pub trait SmsTransport: Send + Sync {
    /// Split `text` into the segments the radio would transmit.
    fn divide_message(&self, text: &str) -> Vec<String>;

    fn send_text(
        &self,
        destination: &RawPhoneNumber,
        text: &str,
        sent: CompletionTarget,
        delivered: CompletionTarget,
    ) -> Result<(), PlatformError>;

    /// `sent` and `delivered` hold one target per entry of `parts`.
    fn send_multipart(
        &self,
        destination: &RawPhoneNumber,
        parts: Vec<String>,
        sent: Vec<CompletionTarget>,
        delivered: Vec<CompletionTarget>,
    ) -> Result<(), PlatformError>;

    /// Start routing SMS broadcasts to the bridge.
    fn register_receiver(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn unregister_receiver(&self) {}
}

/// The platform's message store.
pub trait ContentStore: Send + Sync {
    /// `Ok(None)` when the provider hands back no cursor at all.
    fn query(&self, query: &StoreQuery) -> Result<Option<Box<dyn StoreCursor>>, StoreError>;

    /// Returns the row id of the inserted message.
    fn insert(&self, target: StoreTarget, row: NewRow) -> Result<i64, StoreError>;

    /// Returns the number of deleted rows.
    fn delete(&self, target: StoreTarget) -> Result<usize, StoreError>;
}

/// Result set positioned on at most one row at a time.
pub trait StoreCursor: Send {
    fn count(&self) -> usize;

    fn move_to_first(&mut self) -> bool;

    /// Returns `false` once the cursor moves past the last row.
    fn move_to_next(&mut self) -> bool;

    fn get_long(&self, column: &str) -> Result<i64, StoreError>;

    fn get_string(&self, column: &str) -> Result<String, StoreError>;

    /// Release the underlying resource. Idempotent.
    fn close(&mut self);
}

/// The host's notification surface.
pub trait HostNotifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
