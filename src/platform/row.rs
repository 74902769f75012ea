use crate::domain::{
    MessageBox, MessageId, RawPhoneNumber, SmsMessage, Timestamp, ValidationError,
};
use crate::platform::{StoreCursor, StoreError};

pub(crate) const COLUMN_BODY: &str = "body";
pub(crate) const COLUMN_TYPE: &str = "type";

/// Fixed column set read from the message store.
pub(crate) const PROJECTION: [&str; 5] = [
    MessageId::FIELD,
    RawPhoneNumber::FIELD,
    COLUMN_BODY,
    Timestamp::FIELD,
    COLUMN_TYPE,
];

#[derive(Debug, thiserror::Error)]
/// The current row could not be turned into a message.
pub enum RowError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("row has an invalid id: {0}")]
    InvalidId(#[from] ValidationError),

    /// The row is neither an inbox nor a sent-box message (draft, outbox, ...).
    #[error("row has an unexpected type: {0}")]
    InvalidType(i64),
}

/// Id of the row the cursor is positioned on.
pub(crate) fn read_message_id(cursor: &dyn StoreCursor) -> Result<MessageId, RowError> {
    Ok(MessageId::from_row_id(cursor.get_long(MessageId::FIELD)?)?)
}

/// Decode the row the cursor is positioned on.
pub(crate) fn read_message(cursor: &dyn StoreCursor) -> Result<SmsMessage, RowError> {
    let kind = cursor.get_long(COLUMN_TYPE)?;
    let message_box = MessageBox::from_code(kind).ok_or(RowError::InvalidType(kind))?;

    Ok(SmsMessage {
        id: read_message_id(cursor)?,
        message_box,
        address: cursor.get_string(RawPhoneNumber::FIELD)?,
        body: cursor.get_string(COLUMN_BODY)?,
        timestamp: Timestamp::from_millis(cursor.get_long(Timestamp::FIELD)?),
    })
}
