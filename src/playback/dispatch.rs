//! Owning execution context for the playback surface.
//!
//! All surface and stream mutation is marshalled onto a single worker thread,
//! which makes ordering explicit: the drift monitor's timer thread, the clock
//! event thread, and the host's update cycle all funnel through here instead
//! of touching the stream directly.

use crossbeam::channel::{self, Sender};
use std::thread::{self, JoinHandle, ThreadId};

type Job = Box<dyn FnOnce() + Send>;

/// Single-threaded task queue. Jobs run in submission order on one worker
/// thread; `invoke` blocks the caller until its job has run.
pub struct Dispatcher {
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Dispatcher {
    pub fn new(name: &str) -> Self {
        let (tx, rx) = channel::unbounded::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in rx.iter() {
                    job();
                }
            })
            .unwrap_or_else(|e| panic!("failed to spawn dispatcher thread: {e}"));
        let thread_id = handle.thread().id();

        Self {
            tx: Some(tx),
            handle: Some(handle),
            thread_id,
        }
    }

    /// Run `f` on the dispatcher thread and return its result.
    ///
    /// When already called from the dispatcher thread the closure runs
    /// inline (queueing would deadlock the worker against itself). Returns
    /// `None` once the dispatcher has shut down, which callers treat as
    /// "teardown in flight, skip".
    pub fn invoke<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if thread::current().id() == self.thread_id {
            return Some(f());
        }

        let tx = self.tx.as_ref()?;
        let (done_tx, done_rx) = channel::bounded(1);
        let job: Job = Box::new(move || {
            let _ = done_tx.send(f());
        });
        if tx.send(job).is_err() {
            return None;
        }
        done_rx.recv().ok()
    }

    /// Stop accepting jobs and wait for the worker to drain. Idempotent.
    pub fn shutdown(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
