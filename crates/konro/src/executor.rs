//! The dedicated worker thread and its deadline-bound bridge.
//!
//! The wrapped engine holds thread-affine state that is invalidated by
//! cross-thread access, so every engine operation for the lifetime of a
//! session must run on one persistent OS thread. [`WorkerExecutor`] owns
//! that thread, moves the state into it at start, and serializes submitted
//! jobs onto it in FIFO order. Jobs are closures over `&mut S`, which pins
//! all access to the state inside the worker loop without any locking.
//!
//! Callers on arbitrary threads or async tasks interact with the worker
//! only through [`submit`](WorkerExecutor::submit) (suspends the calling
//! task) or [`submit_blocking`](WorkerExecutor::submit_blocking) (blocks the
//! calling thread). Both carry a deadline.
//!
//! # Deadlines do not cancel work
//!
//! A deadline bounds only the caller's wait. There is no safe way to
//! interrupt the native engine mid-decode, so a job whose caller timed out
//! keeps running on the worker until it finishes; its result is then
//! discarded and logged. "Wait with deadline" and "cancel the operation"
//! are deliberately distinct capabilities, and this executor only provides
//! the former.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{BridgeError, Result};

/// A unit of work executed on the worker thread against the owned state.
type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Single-threaded executor owning a state value of type `S`.
///
/// Exactly one OS thread services the queue for the lifetime of the
/// executor. Dropping the executor shuts the thread down and abandons any
/// queued-but-unstarted jobs.
pub struct WorkerExecutor<S> {
    /// Job queue into the worker; `None` once shutdown has run.
    sender: Option<mpsc::Sender<Job<S>>>,

    /// Cleared on shutdown so the worker abandons queued jobs instead of
    /// draining them.
    running: Arc<AtomicBool>,

    thread: Option<thread::JoinHandle<()>>,
}

impl<S: Send + 'static> WorkerExecutor<S> {
    /// Spawns the worker thread and moves `state` into it.
    ///
    /// Blocks the calling context until the worker signals it has reached
    /// its receive loop, so a submission made immediately after `start`
    /// returns always has a consumer.
    pub fn start(state: S) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job<S>>();
        let (ready_tx, ready_rx) = mpsc::channel::<()>();
        let running = Arc::new(AtomicBool::new(true));

        let thread = thread::Builder::new()
            .name("konro-worker".into())
            .spawn({
                let running = running.clone();
                move || worker_loop(state, job_rx, ready_tx, running)
            })
            .map_err(|_| BridgeError::ExecutorNotReady)?;

        // Wait for the worker to reach its loop before accepting work.
        ready_rx.recv().map_err(|_| BridgeError::ExecutorNotReady)?;

        tracing::debug!("worker thread started");
        Ok(WorkerExecutor {
            sender: Some(job_tx),
            running,
            thread: Some(thread),
        })
    }

    /// Runs `work` on the worker thread, suspending the calling task until
    /// it finishes or `timeout` elapses, whichever comes first.
    ///
    /// On success or failure of `work` itself, the result crosses the
    /// bridge verbatim. On deadline expiry the call fails with
    /// [`BridgeError::Timeout`] while `work` continues in the background.
    pub async fn submit<T, F>(&self, timeout: Duration, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T> + Send + 'static,
    {
        let job_id = Uuid::new_v4();
        let (result_tx, result_rx) = oneshot::channel();
        self.enqueue(move |state| {
            let result = work(state);
            if result_tx.send(result).is_err() {
                // The caller stopped waiting; the work still ran to
                // completion on the worker.
                tracing::warn!(job = %job_id, "result discarded, caller gave up");
            }
        })?;

        match tokio::time::timeout(timeout, result_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::UnreachableBridge),
            Err(_) => {
                tracing::warn!(job = %job_id, ?timeout, "deadline elapsed, job keeps running");
                Err(BridgeError::Timeout(timeout))
            }
        }
    }

    /// Synchronous counterpart of [`submit`](WorkerExecutor::submit): blocks
    /// the calling thread on the result channel until completion or
    /// deadline. Must not be called from the worker thread itself.
    pub fn submit_blocking<T, F>(&self, timeout: Duration, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T> + Send + 'static,
    {
        let job_id = Uuid::new_v4();
        let (result_tx, result_rx) = mpsc::sync_channel(1);
        self.enqueue(move |state| {
            let _ = result_tx.send(work(state));
        })?;

        match result_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(job = %job_id, ?timeout, "deadline elapsed, job keeps running");
                Err(BridgeError::Timeout(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(BridgeError::UnreachableBridge),
        }
    }

    /// Stops the loop and joins the thread.
    ///
    /// Queued-but-unstarted jobs are abandoned: they never run, and their
    /// callers observe [`BridgeError::UnreachableBridge`]. Submissions made
    /// after shutdown are rejected with [`BridgeError::ExecutorNotReady`].
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        // Dropping the sender closes the queue and wakes the worker.
        self.sender = None;

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            tracing::debug!("worker thread joined");
        }
    }

    /// Hands a job to the worker queue without waiting on it. Used by the
    /// deadline-bound submits above and by the façade's streaming path,
    /// where the result is observed out of band.
    pub(crate) fn enqueue(&self, job: impl FnOnce(&mut S) + Send + 'static) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(BridgeError::ExecutorNotReady)?;
        sender
            .send(Box::new(job))
            .map_err(|_| BridgeError::ExecutorNotReady)
    }
}

impl<S> Drop for WorkerExecutor<S> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.sender = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The wait-for-work loop running on the dedicated thread. Owns the state
/// for its entire lifetime.
fn worker_loop<S>(
    mut state: S,
    job_rx: mpsc::Receiver<Job<S>>,
    ready_tx: mpsc::Sender<()>,
    running: Arc<AtomicBool>,
) {
    let _ = ready_tx.send(());
    drop(ready_tx);

    while let Ok(job) = job_rx.recv() {
        if !running.load(Ordering::Acquire) {
            break;
        }
        job(&mut state);
    }

    tracing::debug!("worker loop exited");
}
