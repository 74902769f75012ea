//! Hand-written fakes shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::domain::{MessageId, Notification, RawPhoneNumber, Timestamp};
use crate::manager::{SmsManager, SmsManagerBuilder};
use crate::platform::memory::MemoryStore;
use crate::platform::{
    CompletionTarget, ContentStore, HostNotifier, NewRow, PlatformError, SmsTransport,
    StoreCursor, StoreError, StoreQuery, StoreTarget,
};

const WAIT: Duration = Duration::from_secs(5);

/// Host that records every notification in arrival order.
pub(crate) struct RecordingHost {
    tx: Mutex<mpsc::Sender<Notification>>,
    rx: Mutex<mpsc::Receiver<Notification>>,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
        }
    }

    /// Wait for the next notification.
    pub(crate) fn next(&self) -> Notification {
        self.rx
            .lock()
            .recv_timeout(WAIT)
            .expect("timed out waiting for a notification")
    }

    /// Everything received so far.
    pub(crate) fn take(&self) -> Vec<Notification> {
        self.rx.lock().try_iter().collect()
    }

    pub(crate) fn assert_quiet(&self) {
        let pending = self.take();
        assert!(pending.is_empty(), "unexpected notifications: {pending:?}");
    }
}

impl HostNotifier for RecordingHost {
    fn notify(&self, notification: Notification) {
        let _ = self.tx.lock().send(notification);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedSend {
    pub(crate) destination: String,
    pub(crate) parts: Vec<String>,
    pub(crate) multipart: bool,
    pub(crate) sent: Vec<CompletionTarget>,
    pub(crate) delivered: Vec<CompletionTarget>,
}

/// Transport that keeps every dispatched send for the test to complete by hand.
pub(crate) struct RecordingTransport {
    segment_size: usize,
    reject: bool,
    refuse_registration: bool,
    registered: AtomicBool,
    sends: Mutex<Vec<RecordedSend>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            segment_size: 160,
            reject: false,
            refuse_registration: false,
            registered: AtomicBool::new(false),
            sends: Mutex::new(Vec::new()),
        }
    }

    /// Characters per divided segment; `0` divides everything into nothing.
    pub(crate) fn segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    pub(crate) fn reject_sends(mut self) -> Self {
        self.reject = true;
        self
    }

    pub(crate) fn refuse_registration(mut self) -> Self {
        self.refuse_registration = true;
        self
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub(crate) fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().clone()
    }

    pub(crate) fn last_send(&self) -> RecordedSend {
        self.sends.lock().last().cloned().expect("nothing was sent")
    }

    fn record(&self, send: RecordedSend) -> Result<(), PlatformError> {
        if self.reject {
            return Err(PlatformError::Rejected("radio is busy".to_owned()));
        }
        self.sends.lock().push(send);
        Ok(())
    }
}

impl SmsTransport for RecordingTransport {
    fn divide_message(&self, text: &str) -> Vec<String> {
        if self.segment_size == 0 {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.segment_size)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }

    fn send_text(
        &self,
        destination: &RawPhoneNumber,
        text: &str,
        sent: CompletionTarget,
        delivered: CompletionTarget,
    ) -> Result<(), PlatformError> {
        self.record(RecordedSend {
            destination: destination.raw().to_owned(),
            parts: vec![text.to_owned()],
            multipart: false,
            sent: vec![sent],
            delivered: vec![delivered],
        })
    }

    fn send_multipart(
        &self,
        destination: &RawPhoneNumber,
        parts: Vec<String>,
        sent: Vec<CompletionTarget>,
        delivered: Vec<CompletionTarget>,
    ) -> Result<(), PlatformError> {
        self.record(RecordedSend {
            destination: destination.raw().to_owned(),
            parts,
            multipart: true,
            sent,
            delivered,
        })
    }

    fn register_receiver(&self) -> Result<(), PlatformError> {
        if self.refuse_registration {
            return Err(PlatformError::Registration("permission denied".to_owned()));
        }
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unregister_receiver(&self) {
        self.registered.store(false, Ordering::SeqCst);
    }
}

/// Store whose every call fails, or panics.
pub(crate) struct FailingStore {
    panic: bool,
}

impl FailingStore {
    pub(crate) fn new() -> Self {
        Self { panic: false }
    }

    pub(crate) fn panicking() -> Self {
        Self { panic: true }
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        if self.panic {
            panic!("provider crashed");
        }
        Err(StoreError::Provider("provider unavailable".into()))
    }
}

impl ContentStore for FailingStore {
    fn query(&self, _query: &StoreQuery) -> Result<Option<Box<dyn StoreCursor>>, StoreError> {
        self.fail()
    }

    fn insert(&self, _target: StoreTarget, _row: NewRow) -> Result<i64, StoreError> {
        self.fail()
    }

    fn delete(&self, _target: StoreTarget) -> Result<usize, StoreError> {
        self.fail()
    }
}

/// Store that answers single-message queries with the row after the one asked for.
pub(crate) struct MisroutingStore {
    inner: Arc<MemoryStore>,
}

impl MisroutingStore {
    pub(crate) fn new(inner: Arc<MemoryStore>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl ContentStore for MisroutingStore {
    fn query(&self, query: &StoreQuery) -> Result<Option<Box<dyn StoreCursor>>, StoreError> {
        match query.target() {
            StoreTarget::Message(id) => self
                .inner
                .query(&StoreQuery::message(MessageId::new(id.value() + 1))),
            _ => self.inner.query(query),
        }
    }

    fn insert(&self, target: StoreTarget, row: NewRow) -> Result<i64, StoreError> {
        self.inner.insert(target, row)
    }

    fn delete(&self, target: StoreTarget) -> Result<usize, StoreError> {
        self.inner.delete(target)
    }
}

/// Store whose cursors open, count and close normally but panic on any column read.
pub(crate) struct CrashingRowStore {
    inner: Arc<MemoryStore>,
}

impl CrashingRowStore {
    pub(crate) fn new(inner: Arc<MemoryStore>) -> Self {
        Self { inner }
    }
}

struct CrashingCursor(Box<dyn StoreCursor>);

impl StoreCursor for CrashingCursor {
    fn count(&self) -> usize {
        self.0.count()
    }

    fn move_to_first(&mut self) -> bool {
        self.0.move_to_first()
    }

    fn move_to_next(&mut self) -> bool {
        self.0.move_to_next()
    }

    fn get_long(&self, column: &str) -> Result<i64, StoreError> {
        panic!("row decoder crashed on {column}");
    }

    fn get_string(&self, column: &str) -> Result<String, StoreError> {
        panic!("row decoder crashed on {column}");
    }

    fn close(&mut self) {
        self.0.close();
    }
}

impl ContentStore for CrashingRowStore {
    fn query(&self, query: &StoreQuery) -> Result<Option<Box<dyn StoreCursor>>, StoreError> {
        Ok(self
            .inner
            .query(query)?
            .map(|cursor| Box::new(CrashingCursor(cursor)) as Box<dyn StoreCursor>))
    }

    fn insert(&self, target: StoreTarget, row: NewRow) -> Result<i64, StoreError> {
        self.inner.insert(target, row)
    }

    fn delete(&self, target: StoreTarget) -> Result<usize, StoreError> {
        self.inner.delete(target)
    }
}

/// Store whose inserts wait until the test opens the gate.
pub(crate) struct GatedStore {
    inner: Arc<MemoryStore>,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedStore {
    /// Returns the store, a receiver signalled when an insert starts waiting,
    /// and the sender that lets it through.
    pub(crate) fn new(
        inner: Arc<MemoryStore>,
    ) -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Self {
            inner,
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (store, entered_rx, release_tx)
    }
}

impl ContentStore for GatedStore {
    fn query(&self, query: &StoreQuery) -> Result<Option<Box<dyn StoreCursor>>, StoreError> {
        self.inner.query(query)
    }

    fn insert(&self, target: StoreTarget, row: NewRow) -> Result<i64, StoreError> {
        let _ = self.entered.lock().send(());
        self.release
            .lock()
            .recv_timeout(WAIT)
            .expect("gate was never opened");
        self.inner.insert(target, row)
    }

    fn delete(&self, target: StoreTarget) -> Result<usize, StoreError> {
        self.inner.delete(target)
    }
}

/// Builder wired to the fakes with a clock frozen at 1000 ms.
pub(crate) fn builder(
    transport: &Arc<RecordingTransport>,
    store: Arc<dyn ContentStore>,
    host: &Arc<RecordingHost>,
) -> SmsManagerBuilder {
    let transport: Arc<dyn SmsTransport> = transport.clone();
    let host: Arc<dyn HostNotifier> = host.clone();
    SmsManager::builder(transport, store, host)
        .worker_thread_name("sms-test")
        .clock(|| Timestamp::from_millis(1_000))
}

/// A manager that has not been started.
pub(crate) fn manager(
    transport: &Arc<RecordingTransport>,
    store: Arc<dyn ContentStore>,
    host: &Arc<RecordingHost>,
) -> SmsManager {
    builder(transport, store, host)
        .build()
        .expect("manager should build")
}

/// A manager already receiving broadcasts.
pub(crate) fn started(
    transport: &Arc<RecordingTransport>,
    store: Arc<dyn ContentStore>,
    host: &Arc<RecordingHost>,
) -> SmsManager {
    let manager = manager(transport, store, host);
    manager.start().expect("manager should start");
    manager
}
