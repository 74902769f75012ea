use serde::Serialize;

use crate::domain::value::{ListId, MessageId, RequestContext, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
/// Error taxonomy visible to the host.
///
/// The integer values are shared with the host and must not change.
pub enum ErrorCode {
    #[default]
    NoError,
    NoSignal,
    NotFound,
    Unknown,
    Internal,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::NoSignal => 1,
            Self::NotFound => 2,
            Self::Unknown => 3,
            Self::Internal => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
/// Store box a message lives in.
pub enum MessageBox {
    Inbox,
    Sent,
}

impl MessageBox {
    /// Store `type` column value for inbox rows.
    pub const INBOX_CODE: i64 = 1;
    /// Store `type` column value for sent-box rows.
    pub const SENT_CODE: i64 = 2;

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            Self::INBOX_CODE => Some(Self::Inbox),
            Self::SENT_CODE => Some(Self::Sent),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Inbox => Self::INBOX_CODE,
            Self::Sent => Self::SENT_CODE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A message read back from the store.
pub struct SmsMessage {
    pub id: MessageId,
    pub message_box: MessageBox,
    /// Remote party: the sender for inbox rows, the receiver for sent rows.
    pub address: String,
    pub body: String,
    pub timestamp: Timestamp,
}

impl SmsMessage {
    pub fn sender(&self) -> Option<&str> {
        (self.message_box == MessageBox::Inbox).then_some(self.address.as_str())
    }

    pub fn receiver(&self) -> Option<&str> {
        (self.message_box == MessageBox::Sent).then_some(self.address.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Outcome reported to the host.
///
/// Every logical operation produces exactly one of these; incoming messages and
/// delivery reports are unsolicited.
pub enum Notification {
    SmsReceived {
        sender: String,
        body: String,
        timestamp: Timestamp,
    },
    SendSucceeded {
        /// `None` when the sent copy could not be saved.
        message_id: Option<MessageId>,
        receiver: String,
        body: String,
        timestamp: Timestamp,
        request: RequestContext,
    },
    SendFailed {
        error: ErrorCode,
        request: RequestContext,
    },
    Delivered {
        message_id: Option<MessageId>,
        receiver: String,
        body: String,
        timestamp: Timestamp,
    },
    MessageFound {
        message: SmsMessage,
        request: RequestContext,
    },
    MessageNotFound {
        error: ErrorCode,
        request: RequestContext,
    },
    Deleted {
        deleted: bool,
        request: RequestContext,
    },
    DeleteFailed {
        error: ErrorCode,
        request: RequestContext,
    },
    ListCreated {
        list_id: ListId,
        message: SmsMessage,
        request: RequestContext,
    },
    NoMessagesInList {
        request: RequestContext,
    },
    NextMessage {
        message: SmsMessage,
        request: RequestContext,
    },
    ListReadFailed {
        error: ErrorCode,
        request: RequestContext,
    },
}

impl Notification {
    /// Render the notification for hosts whose RPC layer carries JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Correlation data, if the notification answers a host request.
    pub fn request(&self) -> Option<RequestContext> {
        match self {
            Self::SmsReceived { .. } | Self::Delivered { .. } => None,
            Self::SendSucceeded { request, .. }
            | Self::SendFailed { request, .. }
            | Self::MessageFound { request, .. }
            | Self::MessageNotFound { request, .. }
            | Self::Deleted { request, .. }
            | Self::DeleteFailed { request, .. }
            | Self::ListCreated { request, .. }
            | Self::NoMessagesInList { request }
            | Self::NextMessage { request, .. }
            | Self::ListReadFailed { request, .. } => Some(*request),
        }
    }
}
