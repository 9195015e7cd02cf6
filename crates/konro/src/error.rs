//! Error types for the bridge.
//!
//! Every fallible operation in this crate returns [`BridgeError`]. Errors
//! raised by a job running on the worker thread cross the bridge unchanged
//! and are delivered to the original caller; the one intentional exception
//! is the model-loaded probe, which downgrades any failure to `false`
//! because it is advertised as a non-throwing query.

use thiserror::Error;

/// Top-level error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The worker thread was never started or has already shut down.
    #[error("executor not ready")]
    ExecutorNotReady,

    /// The deadline elapsed while waiting on a submission.
    ///
    /// The submitted job is *not* stopped: the native call cannot be safely
    /// interrupted mid-decode, so it keeps running in the background and its
    /// result is discarded.
    #[error("timed out after {0:?} waiting on the worker thread")]
    Timeout(std::time::Duration),

    /// `generate` was called before a successful `initialize`.
    #[error("model not initialized")]
    ModelNotInitialized,

    /// Passthrough from the wrapped native engine (load or decode failure).
    #[error("engine error: {0}")]
    Engine(String),

    /// A batch append would exceed the configured capacity.
    #[error("batch capacity {capacity} exceeded")]
    BatchCapacity { capacity: usize },

    /// The bridge returned neither success nor failure.
    ///
    /// This should never occur in a correctly assembled bridge; it surfaces
    /// when a job's result channel is dropped without a value, e.g. a job
    /// that was queued but abandoned by shutdown.
    #[error("bridge returned neither success nor failure")]
    UnreachableBridge,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
