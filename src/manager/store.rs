use std::sync::Arc;

use tracing::{debug, error, info};

use crate::domain::{
    ErrorCode, ListId, MessageFilter, MessageId, Notification, RequestContext, SmsMessage,
    Timestamp, ValidationError,
};
use crate::manager::SmsManager;
use crate::platform::{
    ContentStore, NewRow, RowError, StoreCursor, StoreError, StoreQuery, StoreTarget,
    read_message, read_message_id,
};
use crate::registry::CursorRegistry;
use crate::worker::Task;

#[derive(Debug, thiserror::Error)]
/// Saving a sent-box copy failed.
pub enum SaveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The store assigned an id hosts cannot address.
    #[error("saved message got an unusable id: {0}")]
    IdOutOfRange(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
/// Fetching a single message failed.
pub enum GetMessageError {
    #[error("message {0} does not exist")]
    NotFound(MessageId),

    #[error("query for message {id} matched {count} rows")]
    TooManyResults { id: MessageId, count: usize },

    #[error("asked for message {requested} but the store returned {actual}")]
    UnmatchedId {
        requested: MessageId,
        actual: MessageId,
    },

    /// The row exists but is neither an inbox nor a sent-box message.
    #[error("message has an unexpected type: {0}")]
    InvalidType(i64),

    #[error(transparent)]
    Row(RowError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GetMessageError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) | Self::InvalidType(_) => ErrorCode::NotFound,
            _ => ErrorCode::Unknown,
        }
    }
}

impl From<RowError> for GetMessageError {
    fn from(value: RowError) -> Self {
        match value {
            RowError::InvalidType(kind) => Self::InvalidType(kind),
            other => Self::Row(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
/// Deleting a message failed.
pub enum DeleteMessageError {
    #[error("deleting message {id} removed {count} rows")]
    TooManyDeleted { id: MessageId, count: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DeleteMessageError {
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::Unknown
    }
}

#[derive(Debug, thiserror::Error)]
/// Creating or reading a message list failed.
pub enum ListError {
    #[error("no message list with id {0}")]
    UnknownList(ListId),

    #[error("the store returned no cursor")]
    NoCursor,

    #[error("invalid list filter: {0}")]
    InvalidFilter(#[from] ValidationError),

    #[error(transparent)]
    Row(#[from] RowError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ListError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnknownList(_) => ErrorCode::NotFound,
            _ => ErrorCode::Unknown,
        }
    }
}

impl SmsManager {
    /// Persist a copy of a sent message and return its id.
    ///
    /// Runs on the caller's thread.
    pub fn save_sent_message(
        &self,
        recipient: &str,
        body: &str,
        date: Timestamp,
    ) -> Result<MessageId, SaveError> {
        let row = NewRow {
            address: recipient.to_owned(),
            body: body.to_owned(),
            date,
        };
        let saved = self
            .store
            .insert(StoreTarget::Sentbox, row)
            .map_err(SaveError::from)
            .and_then(|id| MessageId::from_row_id(id).map_err(SaveError::from));

        match &saved {
            Ok(id) => debug!(%id, "saved sent message"),
            Err(err) => error!(%err, "failed to save a sent message"),
        }
        saved
    }

    /// Look a message up by id; answers with [`Notification::MessageFound`] or
    /// [`Notification::MessageNotFound`].
    pub fn get_message(&self, id: MessageId, request: RequestContext) {
        let store = Arc::clone(&self.store);
        let host = Arc::clone(&self.host);
        self.enqueue(
            "get-message",
            Notification::MessageNotFound {
                error: ErrorCode::Unknown,
                request,
            },
            move || {
                let notification = match fetch_message(store.as_ref(), id) {
                    Ok(message) => Notification::MessageFound { message, request },
                    Err(err) => {
                        error!(%id, %err, "failed to get a message");
                        Notification::MessageNotFound {
                            error: err.error_code(),
                            request,
                        }
                    }
                };
                host.notify(notification);
            },
        );
    }

    /// Delete a message by id; answers with [`Notification::Deleted`] or
    /// [`Notification::DeleteFailed`].
    pub fn delete_message(&self, id: MessageId, request: RequestContext) {
        let store = Arc::clone(&self.store);
        let host = Arc::clone(&self.host);
        self.enqueue(
            "delete-message",
            Notification::DeleteFailed {
                error: ErrorCode::Unknown,
                request,
            },
            move || {
                let notification = match remove_message(store.as_ref(), id) {
                    Ok(deleted) => Notification::Deleted { deleted, request },
                    Err(err) => {
                        error!(%id, %err, "failed to delete a message");
                        Notification::DeleteFailed {
                            error: err.error_code(),
                            request,
                        }
                    }
                };
                host.notify(notification);
            },
        );
    }

    /// Open a message list; answers with [`Notification::ListCreated`] carrying the
    /// first message, [`Notification::NoMessagesInList`], or
    /// [`Notification::ListReadFailed`].
    pub fn create_message_list(&self, filter: MessageFilter, request: RequestContext) {
        let store = Arc::clone(&self.store);
        let cursors = Arc::clone(&self.cursors);
        let host = Arc::clone(&self.host);
        self.enqueue(
            "create-message-list",
            Notification::ListReadFailed {
                error: ErrorCode::Unknown,
                request,
            },
            move || {
                let notification = match open_list(store.as_ref(), &filter) {
                    Ok(Some((cursor, message))) => {
                        let list_id = cursors.add(cursor);
                        info!(list = %list_id, "message list created");
                        Notification::ListCreated {
                            list_id,
                            message,
                            request,
                        }
                    }
                    Ok(None) => Notification::NoMessagesInList { request },
                    Err(err) => {
                        error!(%err, "failed to create a message list");
                        Notification::ListReadFailed {
                            error: err.error_code(),
                            request,
                        }
                    }
                };
                host.notify(notification);
            },
        );
    }

    /// [`SmsManager::create_message_list`] with the host's raw filter arguments.
    ///
    /// A zero date leaves that side unbounded. An unknown delivery state or an empty
    /// number fails the request with [`ErrorCode::Unknown`].
    pub fn create_message_list_from_host(
        &self,
        start_date: i64,
        end_date: i64,
        numbers: &[String],
        delivery_state: i32,
        reverse: bool,
        request: RequestContext,
    ) {
        match MessageFilter::from_host(start_date, end_date, numbers, delivery_state, reverse) {
            Ok(filter) => self.create_message_list(filter, request),
            Err(err) => {
                let err = ListError::from(err);
                error!(%err, "failed to create a message list");
                self.host.notify(Notification::ListReadFailed {
                    error: err.error_code(),
                    request,
                });
            }
        }
    }

    /// Advance a list; answers with [`Notification::NextMessage`],
    /// [`Notification::NoMessagesInList`] (the list is then closed), or
    /// [`Notification::ListReadFailed`].
    pub fn get_next_message_in_list(&self, list_id: ListId, request: RequestContext) {
        let cursors = Arc::clone(&self.cursors);
        let host = Arc::clone(&self.host);
        self.enqueue(
            "get-next-message",
            Notification::ListReadFailed {
                error: ErrorCode::Unknown,
                request,
            },
            move || {
                let notification = match advance_list(&cursors, list_id) {
                    Ok(Some(message)) => Notification::NextMessage { message, request },
                    Ok(None) => {
                        cursors.remove(list_id);
                        debug!(list = %list_id, "message list exhausted");
                        Notification::NoMessagesInList { request }
                    }
                    Err(err) => {
                        error!(list = %list_id, %err, "failed to read the next message");
                        Notification::ListReadFailed {
                            error: err.error_code(),
                            request,
                        }
                    }
                };
                host.notify(notification);
            },
        );
    }

    /// Close a list. No notification is sent.
    pub fn clear_message_list(&self, list_id: ListId) {
        self.cursors.remove(list_id);
    }

    /// Queue `run` on the worker. The host gets `failure` if the task panics or
    /// cannot be queued.
    fn enqueue(
        &self,
        label: &'static str,
        failure: Notification,
        run: impl FnOnce() + Send + 'static,
    ) {
        let host = Arc::clone(&self.host);
        let fallback = failure.clone();
        let task = Task::new(label, run).on_panic(move || host.notify(fallback));
        if !self.worker.submit(task) {
            error!(task = label, "failed to queue a store task");
            self.host.notify(failure);
        }
    }
}

/// Closes the borrowed cursor if the thread unwinds while it is held.
struct CloseOnUnwind<'a>(&'a mut dyn StoreCursor);

impl Drop for CloseOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.close();
        }
    }
}

/// Run `read` against `cursor`, closing the cursor if `read` panics.
fn read_guarded<R>(
    cursor: &mut dyn StoreCursor,
    read: impl FnOnce(&mut dyn StoreCursor) -> R,
) -> R {
    let mut guard = CloseOnUnwind(cursor);
    read(&mut *guard.0)
}

fn fetch_message(store: &dyn ContentStore, id: MessageId) -> Result<SmsMessage, GetMessageError> {
    let Some(mut cursor) = store.query(&StoreQuery::message(id))? else {
        return Err(GetMessageError::NotFound(id));
    };
    let message = read_guarded(cursor.as_mut(), |cursor| read_single(cursor, id));
    cursor.close();
    message
}

fn read_single(cursor: &mut dyn StoreCursor, id: MessageId) -> Result<SmsMessage, GetMessageError> {
    match cursor.count() {
        0 => return Err(GetMessageError::NotFound(id)),
        1 => {}
        count => return Err(GetMessageError::TooManyResults { id, count }),
    }
    cursor.move_to_first();

    let actual = read_message_id(cursor)?;
    if actual != id {
        return Err(GetMessageError::UnmatchedId {
            requested: id,
            actual,
        });
    }
    Ok(read_message(cursor)?)
}

fn remove_message(store: &dyn ContentStore, id: MessageId) -> Result<bool, DeleteMessageError> {
    match store.delete(StoreTarget::Message(id))? {
        0 => Ok(false),
        1 => Ok(true),
        count => Err(DeleteMessageError::TooManyDeleted { id, count }),
    }
}

/// Query the list and read its first message. The cursor is closed unless it is
/// handed back.
fn open_list(
    store: &dyn ContentStore,
    filter: &MessageFilter,
) -> Result<Option<(Box<dyn StoreCursor>, SmsMessage)>, ListError> {
    let mut cursor = store
        .query(&StoreQuery::list(filter.clone()))?
        .ok_or(ListError::NoCursor)?;

    let first = read_guarded(cursor.as_mut(), |cursor| {
        if cursor.count() == 0 {
            return Ok(None);
        }
        cursor.move_to_first();
        read_message(cursor).map(Some)
    });

    match first {
        Ok(Some(message)) => Ok(Some((cursor, message))),
        Ok(None) => {
            cursor.close();
            Ok(None)
        }
        Err(err) => {
            cursor.close();
            Err(err.into())
        }
    }
}

fn advance_list(cursors: &CursorRegistry, list_id: ListId) -> Result<Option<SmsMessage>, ListError> {
    cursors
        .with_cursor(list_id, |cursor| -> Result<_, ListError> {
            if !cursor.move_to_next() {
                return Ok(None);
            }
            Ok(Some(read_message(cursor)?))
        })
        .map_err(|_| ListError::UnknownList(list_id))?
}
