//! Manager layer: routes host requests and platform broadcasts through the
//! registries, the worker, and the platform traits.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use phonenumber::country;
use tracing::{debug, error, info};

use crate::config::BridgeConfig;
use crate::domain::{
    ListId, Notification, PhoneNumber, RawPhoneNumber, Timestamp, TrackerId, ValidationError,
};
use crate::platform::{
    Broadcast, BroadcastExtras, CompletionTokens, ContentStore, HostNotifier, PlatformError,
    SmsTransport,
};
use crate::registry::{CursorRegistry, DeliveryTracker, TrackerRegistry};
use crate::worker::AsyncWorker;

mod send;
mod store;

pub use store::{DeleteMessageError, GetMessageError, ListError, SaveError};

/// Source of "now" for received and sent messages.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

#[derive(Debug, thiserror::Error)]
/// Errors returned by [`SmsManager`] itself; per-request failures reach the host
/// as notifications instead.
pub enum SmsManagerError {
    /// The background worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// The platform refused a send or a receiver registration.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// One of the domain constructors rejected an invalid value.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The platform divided a long message into zero segments.
    #[error("platform divided the message into no segments")]
    NoSegments,
}

#[derive(Debug, Clone, Copy, Default)]
enum Normalization {
    /// Hand numbers to the platform as the host wrote them (trimmed).
    #[default]
    Raw,
    /// Parse numbers and hand the E.164 form to the platform.
    E164 {
        default_region: Option<country::Id>,
    },
}

/// Builder for [`SmsManager`].
pub struct SmsManagerBuilder {
    transport: Arc<dyn SmsTransport>,
    store: Arc<dyn ContentStore>,
    host: Arc<dyn HostNotifier>,
    config: BridgeConfig,
    clock: Option<Clock>,
    normalization: Normalization,
}

impl SmsManagerBuilder {
    pub fn new(
        transport: Arc<dyn SmsTransport>,
        store: Arc<dyn ContentStore>,
        host: Arc<dyn HostNotifier>,
    ) -> Self {
        Self {
            transport,
            store,
            host,
            config: BridgeConfig::default(),
            clock: None,
            normalization: Normalization::Raw,
        }
    }

    /// Replace every tunable at once.
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Longest body (in characters) sent without asking the platform to divide it.
    pub fn single_segment_limit(mut self, limit: usize) -> Self {
        self.config.single_segment_limit = limit;
        self
    }

    pub fn worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_thread_name = name.into();
        self
    }

    /// Override the wall clock.
    pub fn clock(mut self, clock: impl Fn() -> Timestamp + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Normalize recipients to E.164 before sending.
    ///
    /// `default_region` is used for numbers without an explicit country prefix.
    pub fn normalize_numbers(mut self, default_region: Option<country::Id>) -> Self {
        self.normalization = Normalization::E164 { default_region };
        self
    }

    /// Spawn the worker thread and build the manager.
    pub fn build(self) -> Result<SmsManager, SmsManagerError> {
        let worker = AsyncWorker::spawn(self.config.worker_thread_name.as_str())
            .map_err(SmsManagerError::WorkerSpawn)?;
        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(Timestamp::now),
        };

        Ok(SmsManager {
            transport: self.transport,
            store: self.store,
            host: self.host,
            trackers: TrackerRegistry::new(),
            cursors: Arc::new(CursorRegistry::new()),
            tokens: CompletionTokens::new(),
            worker,
            clock,
            config: self.config,
            normalization: self.normalization,
            receiving: AtomicBool::new(false),
        })
    }
}

/// SMS bridge between a host runtime and the platform telephony stack.
///
/// Host requests return immediately; their outcome arrives later through
/// [`HostNotifier::notify`]. Message-store requests run in order on a single
/// background thread.
///
/// The platform forwards its system broadcasts to [`SmsManager::on_broadcast`];
/// they are only acted upon between [`SmsManager::start`] and [`SmsManager::stop`].
pub struct SmsManager {
    transport: Arc<dyn SmsTransport>,
    store: Arc<dyn ContentStore>,
    host: Arc<dyn HostNotifier>,
    trackers: TrackerRegistry,
    cursors: Arc<CursorRegistry>,
    tokens: CompletionTokens,
    worker: AsyncWorker,
    clock: Clock,
    config: BridgeConfig,
    normalization: Normalization,
    receiving: AtomicBool,
}

impl SmsManager {
    pub fn builder(
        transport: Arc<dyn SmsTransport>,
        store: Arc<dyn ContentStore>,
        host: Arc<dyn HostNotifier>,
    ) -> SmsManagerBuilder {
        SmsManagerBuilder::new(transport, store, host)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Register for SMS broadcasts.
    pub fn start(&self) -> Result<(), SmsManagerError> {
        self.transport.register_receiver()?;
        self.receiving.store(true, Ordering::Release);
        info!("SMS manager started");
        Ok(())
    }

    /// Stop acting on broadcasts. Pending sends keep their trackers.
    pub fn stop(&self) {
        self.receiving.store(false, Ordering::Release);
        self.transport.unregister_receiver();
        info!("SMS manager stopped");
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::Acquire)
    }

    /// Let queued store work finish, stop the worker, and close every open list.
    ///
    /// Requests made afterwards fail immediately. Pending sends are abandoned.
    pub fn shutdown(&self) {
        self.worker.shutdown();
        self.cursors.clear();
        info!(trackers = self.trackers.live(), "SMS manager shut down");
    }

    /// Entry point for system broadcasts.
    ///
    /// May be called from several threads at once. Completions for one send
    /// are applied to its tracker one at a time.
    pub fn on_broadcast(&self, broadcast: Broadcast) {
        if !self.is_receiving() {
            debug!("dropping broadcast received while stopped");
            return;
        }

        match broadcast {
            Broadcast::Received(messages) => {
                for sms in messages {
                    info!(sender = %sms.sender, "SMS received");
                    self.host.notify(Notification::SmsReceived {
                        sender: sms.sender,
                        body: sms.body,
                        timestamp: self.now(),
                    });
                }
            }
            Broadcast::Completion {
                phase,
                result,
                extras,
            } => match extras.and_then(BroadcastExtras::parse) {
                Some(extras) => self.on_completion(phase, result, extras),
                None => error!(?phase, "got an invalid completion broadcast"),
            },
        }
    }

    /// Snapshot of an in-flight send.
    pub fn tracker(&self, id: TrackerId) -> Option<DeliveryTracker> {
        self.trackers.get(id)
    }

    /// Number of sends still waiting for completions.
    pub fn pending_sends(&self) -> usize {
        self.trackers.live()
    }

    pub fn is_list_open(&self, id: ListId) -> bool {
        self.cursors.contains(id)
    }

    /// Number of message lists still open.
    pub fn open_lists(&self) -> usize {
        self.cursors.live()
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    fn destination(&self, number: &str) -> Result<RawPhoneNumber, ValidationError> {
        match self.normalization {
            Normalization::Raw => RawPhoneNumber::new(number),
            Normalization::E164 { default_region } => {
                PhoneNumber::parse(default_region, number).map(RawPhoneNumber::from)
            }
        }
    }
}

impl std::fmt::Debug for SmsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsManager")
            .field("config", &self.config)
            .field("worker", &self.worker.name())
            .field("trackers", &self.trackers.live())
            .field("cursors", &self.cursors)
            .field("receiving", &self.is_receiving())
            .finish()
    }
}
