use crate::domain::{
    DeliveryStateFilter, MessageBox, MessageFilter, MessageId, RawPhoneNumber, Timestamp,
};
use crate::platform::row::{COLUMN_TYPE, PROJECTION};

const CONTENT_URI: &str = "content://sms";
const SENT_CONTENT_URI: &str = "content://sms/sent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which part of the message store an operation addresses.
pub enum StoreTarget {
    /// Every message.
    All,
    /// The sent box; inserts land here.
    Sentbox,
    /// A single message by id.
    Message(MessageId),
}

impl StoreTarget {
    /// Content URI the platform's resolver expects for this target.
    pub fn uri(&self) -> String {
        match self {
            Self::All => CONTENT_URI.to_owned(),
            Self::Sentbox => SENT_CONTENT_URI.to_owned(),
            Self::Message(id) => format!("{CONTENT_URI}/{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// `WHERE` clause with `?` placeholders and the values bound to them, in order.
pub struct Selection {
    pub clause: String,
    pub args: Vec<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    DateAscending,
    DateDescending,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::DateAscending => "date ASC",
            Self::DateDescending => "date DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A read against the message store.
///
/// Store adapters either translate [`StoreQuery::selection`] and
/// [`StoreQuery::sort_order`] into a provider call, or evaluate
/// [`StoreQuery::filter`] directly.
pub struct StoreQuery {
    target: StoreTarget,
    filter: Option<MessageFilter>,
}

impl StoreQuery {
    /// Look up one message by id.
    pub fn message(id: MessageId) -> Self {
        Self {
            target: StoreTarget::Message(id),
            filter: None,
        }
    }

    /// List every message matching `filter`.
    pub fn list(filter: MessageFilter) -> Self {
        Self {
            target: StoreTarget::All,
            filter: Some(filter),
        }
    }

    pub fn target(&self) -> StoreTarget {
        self.target
    }

    pub fn filter(&self) -> Option<&MessageFilter> {
        self.filter.as_ref()
    }

    /// Columns every query reads.
    pub fn projection(&self) -> &'static [&'static str] {
        &PROJECTION
    }

    pub fn selection(&self) -> Selection {
        self.filter
            .as_ref()
            .map(encode_selection)
            .unwrap_or_default()
    }

    pub fn sort_order(&self) -> Option<SortOrder> {
        self.filter.as_ref().map(|filter| {
            if filter.is_reverse() {
                SortOrder::DateDescending
            } else {
                SortOrder::DateAscending
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Values of a row inserted into the sent box.
pub struct NewRow {
    pub address: String,
    pub body: String,
    pub date: Timestamp,
}

fn encode_selection(filter: &MessageFilter) -> Selection {
    let mut restrictions = Vec::<String>::new();
    let mut args = Vec::<String>::new();

    if let Some(start) = filter.start() {
        restrictions.push(format!("{} >= ?", Timestamp::FIELD));
        args.push(start.as_millis().to_string());
    }
    if let Some(end) = filter.end() {
        restrictions.push(format!("{} <= ?", Timestamp::FIELD));
        args.push(end.as_millis().to_string());
    }

    let numbers = filter.number_list();
    if !numbers.is_empty() {
        let placeholders = vec!["?"; numbers.len()].join(", ");
        restrictions.push(format!("{} IN ({placeholders})", RawPhoneNumber::FIELD));
        args.extend(numbers.iter().map(|number| number.raw().to_owned()));
    }

    match filter.delivery_state() {
        DeliveryStateFilter::Any => {
            restrictions.push(format!("{COLUMN_TYPE} IN (?, ?)"));
            args.push(MessageBox::Sent.code().to_string());
            args.push(MessageBox::Inbox.code().to_string());
        }
        DeliveryStateFilter::Sent => {
            restrictions.push(format!("{COLUMN_TYPE} = ?"));
            args.push(MessageBox::Sent.code().to_string());
        }
        DeliveryStateFilter::Received => {
            restrictions.push(format!("{COLUMN_TYPE} = ?"));
            args.push(MessageBox::Inbox.code().to_string());
        }
    }

    Selection {
        clause: restrictions.join(" AND "),
        args,
    }
}
