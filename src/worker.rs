//! Serial background queue for blocking message-store work.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work for [`AsyncWorker`].
pub struct Task {
    label: &'static str,
    run: Job,
    on_panic: Option<Job>,
}

impl Task {
    pub fn new(label: &'static str, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label,
            run: Box::new(run),
            on_panic: None,
        }
    }

    /// Run `fallback` instead if the task panics.
    pub fn on_panic(mut self, fallback: impl FnOnce() + Send + 'static) -> Self {
        self.on_panic = Some(Box::new(fallback));
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    fn execute(self) {
        let Self {
            label,
            run,
            on_panic,
        } = self;
        debug!(task = label, "running task");
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(run)) {
            error!(task = label, panic = panic_message(payload.as_ref()), "task panicked");
            if let Some(fallback) = on_panic {
                if panic::catch_unwind(AssertUnwindSafe(fallback)).is_err() {
                    error!(task = label, "task fallback panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[derive(Debug)]
/// One dedicated thread draining a FIFO task queue.
///
/// Tasks run one at a time in submission order. A panicking task is logged and
/// replaced by its fallback; the thread keeps going.
pub struct AsyncWorker {
    name: String,
    tx: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    join: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl AsyncWorker {
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_loop(rx))?;
        let thread_id = join.thread().id();

        Ok(Self {
            name,
            tx: Mutex::new(Some(tx)),
            join: Mutex::new(Some(join)),
            thread_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `task`. Returns `false` if the worker is shut down.
    pub fn submit(&self, task: Task) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            warn!(worker = %self.name, task = task.label(), "worker is shut down");
            return false;
        };
        match tx.send(task) {
            Ok(()) => true,
            Err(mpsc::error::SendError(task)) => {
                error!(worker = %self.name, task = task.label(), "worker queue is closed");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.tx.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Close the queue, let already queued tasks finish, and join the thread.
    ///
    /// When called from a task on the worker thread itself, the queue is closed
    /// but the thread is not joined.
    pub fn shutdown(&self) {
        drop(self.tx.lock().take());

        if thread::current().id() == self.thread_id {
            return;
        }
        if let Some(join) = self.join.lock().take() {
            if join.join().is_err() {
                error!(worker = %self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for AsyncWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(mut rx: mpsc::UnboundedReceiver<Task>) {
    while let Some(task) = rx.blocking_recv() {
        task.execute();
    }
    debug!("worker queue drained");
}
