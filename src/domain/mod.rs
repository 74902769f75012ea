//! Domain layer: strong types with validation and invariants (no I/O).

mod request;
mod response;
mod validation;
mod value;

pub use request::{DeliveryStateFilter, MessageFilter};
pub use response::{ErrorCode, MessageBox, Notification, SmsMessage};
pub use validation::ValidationError;
pub use value::{
    ListId, MessageId, PhoneNumber, RawPhoneNumber, RequestContext, Timestamp, TrackerId,
};
