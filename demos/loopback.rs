use std::sync::{Arc, mpsc};
use std::time::Duration;

use parking_lot::Mutex;
use smsbridge::platform::memory::MemoryStore;
use smsbridge::{
    Broadcast, CompletionTarget, HostNotifier, IncomingSms, MessageFilter, Notification,
    PlatformError, RawPhoneNumber, RequestContext, ResultCode, SmsManager, SmsTransport,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Radio that accepts every send and completes it on [`LoopbackRadio::flush`].
#[derive(Default)]
struct LoopbackRadio {
    pending: Mutex<Vec<CompletionTarget>>,
}

impl LoopbackRadio {
    fn flush(&self) -> Vec<CompletionTarget> {
        std::mem::take(&mut *self.pending.lock())
    }

    fn queue(&self, targets: impl IntoIterator<Item = CompletionTarget>) {
        self.pending.lock().extend(targets);
    }
}

impl SmsTransport for LoopbackRadio {
    fn divide_message(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars.chunks(153).map(|chunk| chunk.iter().collect()).collect()
    }

    fn send_text(
        &self,
        destination: &RawPhoneNumber,
        _text: &str,
        sent: CompletionTarget,
        delivered: CompletionTarget,
    ) -> Result<(), PlatformError> {
        info!(destination = destination.raw(), "radio: single part");
        self.queue([sent, delivered]);
        Ok(())
    }

    fn send_multipart(
        &self,
        destination: &RawPhoneNumber,
        parts: Vec<String>,
        sent: Vec<CompletionTarget>,
        delivered: Vec<CompletionTarget>,
    ) -> Result<(), PlatformError> {
        info!(destination = destination.raw(), parts = parts.len(), "radio: multipart");
        self.queue(sent.into_iter().chain(delivered));
        Ok(())
    }
}

struct ChannelHost(Mutex<mpsc::Sender<Notification>>);

impl HostNotifier for ChannelHost {
    fn notify(&self, notification: Notification) {
        let _ = self.0.lock().send(notification);
    }
}

fn print_next(rx: &mpsc::Receiver<Notification>) -> Result<Notification, Box<dyn std::error::Error>> {
    let notification = rx.recv_timeout(Duration::from_secs(5))?;
    println!("{}", notification.to_json()?);
    Ok(notification)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let phone = std::env::var("SMSBRIDGE_PHONE").unwrap_or_else(|_| "+79251234567".to_owned());
    let message = std::env::var("SMSBRIDGE_MESSAGE")
        .unwrap_or_else(|_| "Hello from the smsbridge loopback demo.".to_owned());

    let radio = Arc::new(LoopbackRadio::default());
    let (tx, rx) = mpsc::channel();
    let manager = SmsManager::builder(
        radio.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(ChannelHost(Mutex::new(tx))),
    )
    .build()?;
    manager.start()?;

    manager.send(&phone, &message, RequestContext::new(1, std::process::id().into()));
    for target in radio.flush() {
        manager.on_broadcast(target.broadcast(ResultCode::OK));
    }
    print_next(&rx)?;
    print_next(&rx)?;

    manager.on_broadcast(Broadcast::Received(vec![IncomingSms {
        sender: phone.clone(),
        body: format!("echo: {message}"),
    }]));
    print_next(&rx)?;

    manager.create_message_list(MessageFilter::new(), RequestContext::new(2, 0));
    if let Notification::ListCreated { list_id, .. } = print_next(&rx)? {
        loop {
            manager.get_next_message_in_list(list_id, RequestContext::new(3, 0));
            if !matches!(print_next(&rx)?, Notification::NextMessage { .. }) {
                break;
            }
        }
    }

    manager.stop();
    manager.shutdown();
    Ok(())
}
