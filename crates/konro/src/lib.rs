//! # Konro
//!
//! A deadline-bound asynchronous bridge to a stateful, thread-affine native
//! text-generation engine.
//!
//! ## Overview
//!
//! Native inference engines commonly keep internal state that is only valid
//! when accessed from one fixed OS thread, while the application code that
//! wants completions runs on arbitrary threads and async tasks. This crate
//! pins every engine operation to one dedicated worker thread, gives callers
//! a deadline-bound request/response contract across that boundary, and
//! layers a streaming-generation protocol (stop-sequence detection and a
//! KV-cache reuse heuristic) on top.
//!
//! Key components include:
//!
//! - A single-threaded executor that owns the engine state and bridges
//!   async and blocking callers with deadlines
//! - A generation session implementing the feed/decode loop and the
//!   system-prompt cache heuristic
//! - A streaming stop-sequence filter with bounded lookback
//! - A bounds-checked positional batch for the engine's wire format
//!
//! ## Architecture
//!
//! ```text
//! caller (async task) ── submit(work, deadline) ──> worker thread
//!                                                     owns: engine handle,
//!                                                     session state
//! caller <── result / error / Timeout ───────────────┘
//! ```
//!
//! A caller invokes the [`InferenceBridge`] façade; the façade
//! submits a closure to the executor with a deadline; the closure runs the
//! session logic on the dedicated thread, assembling batches to feed tokens
//! and passing sampled fragments through the stop filter; the result (or
//! error, or timeout) crosses back to the caller.
//!
//! ## Deadlines
//!
//! A deadline bounds the caller's wait, never the work: there is no safe
//! way to interrupt the native engine mid-decode, so a timed-out job keeps
//! running on the worker and its result is discarded. Callers wanting to
//! "cancel" a generation are really choosing to stop consuming it.
//!
//! ## Engine surface
//!
//! The engine itself is a black box behind the [`NativeEngine`]
//! trait: tokenize, feed a batch, sample the next token, detokenize it,
//! clear the context. Tokenizer internals, attention math, and sampling
//! strategy are all the engine's own business.

mod batch;
mod bridge;
mod config;
mod engine;
mod error;
mod executor;
mod request;
mod session;
mod stop;

pub use batch::{TokenBatch, TokenId};
pub use bridge::{FragmentStream, InferenceBridge, TextGenerator};
pub use config::{EngineParams, GenerationConfig};
pub use engine::{EngineLoader, NativeEngine};
pub use error::{BridgeError, Result};
pub use executor::WorkerExecutor;
pub use request::{ConversationTurn, GenerationRequest, Role};
pub use session::InferenceSession;
pub use stop::{FilterStep, StopSequenceFilter};
