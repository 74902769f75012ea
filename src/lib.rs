//! SMS bridge between a host runtime and a mobile platform's telephony stack.
//!
//! The crate is layered like this: a domain layer of strong types, a platform
//! layer describing the telephony stack, the message store and the host as
//! traits, registries for in-flight sends and open message lists, a single
//! background worker for store I/O, and [`SmsManager`] orchestrating all of it.
//!
//! Every host request answers asynchronously through [`HostNotifier`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use smsbridge::platform::memory::MemoryStore;
//! use smsbridge::{
//!     CompletionTarget, HostNotifier, Notification, PlatformError, RawPhoneNumber,
//!     RequestContext, SmsManager, SmsTransport,
//! };
//!
//! struct Radio;
//!
//! impl SmsTransport for Radio {
//!     fn divide_message(&self, text: &str) -> Vec<String> {
//!         vec![text.to_owned()]
//!     }
//!
//!     fn send_text(
//!         &self,
//!         _destination: &RawPhoneNumber,
//!         _text: &str,
//!         _sent: CompletionTarget,
//!         _delivered: CompletionTarget,
//!     ) -> Result<(), PlatformError> {
//!         Ok(())
//!     }
//!
//!     fn send_multipart(
//!         &self,
//!         _destination: &RawPhoneNumber,
//!         _parts: Vec<String>,
//!         _sent: Vec<CompletionTarget>,
//!         _delivered: Vec<CompletionTarget>,
//!     ) -> Result<(), PlatformError> {
//!         Ok(())
//!     }
//! }
//!
//! struct Printer;
//!
//! impl HostNotifier for Printer {
//!     fn notify(&self, notification: Notification) {
//!         println!("{notification:?}");
//!     }
//! }
//!
//! fn main() -> Result<(), smsbridge::SmsManagerError> {
//!     let manager =
//!         SmsManager::builder(Arc::new(Radio), Arc::new(MemoryStore::new()), Arc::new(Printer))
//!             .build()?;
//!     manager.start()?;
//!     manager.send("+79251234567", "hello", RequestContext::new(1, 1));
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod manager;
pub mod platform;
pub mod registry;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::BridgeConfig;
pub use domain::{
    DeliveryStateFilter, ErrorCode, ListId, MessageBox, MessageFilter, MessageId, Notification,
    PhoneNumber, RawPhoneNumber, RequestContext, SmsMessage, Timestamp, TrackerId,
    ValidationError,
};
pub use manager::{
    Clock, DeleteMessageError, GetMessageError, ListError, SaveError, SmsManager,
    SmsManagerBuilder, SmsManagerError,
};
pub use platform::{
    Broadcast, BroadcastExtras, CompletionTarget, ContentStore, HostNotifier, IncomingSms,
    PlatformError, ResultCode, SmsTransport, StoreCursor, StoreError,
};
pub use registry::Phase;
