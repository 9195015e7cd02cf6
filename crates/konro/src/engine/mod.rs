//! Black-box capability surface of the native engine.
//!
//! The crate never looks inside the engine: tokenizer, attention math, and
//! sampler are its own business. What the bridge needs is the small surface
//! below (load, feed a batch, sample the next token, detokenize it, and
//! clear the context) plus the guarantee that every call happens on the one
//! thread the engine's state is affine to. The bridge provides that
//! guarantee; implementations of these traits do not need their own locking.
//!
//! Implementations wrap the actual FFI layer. Tests substitute recording
//! fakes, which is also how the cache-reuse heuristic is verified.

use crate::batch::{TokenBatch, TokenId};
use crate::config::EngineParams;
use crate::error::Result;

/// A loaded native engine instance.
///
/// Exclusively owned by the inference session, created lazily on the first
/// successful initialize, and dereferenced only from the worker thread.
/// `Send` is required to move the instance onto the worker thread once; it
/// is never shared or cloned after that.
pub trait NativeEngine: Send + 'static {
    /// Encodes text into engine vocabulary tokens.
    fn tokenize(&self, text: &str) -> Vec<TokenId>;

    /// Feeds one positional batch into the engine's context.
    fn feed_batch(&mut self, batch: &TokenBatch) -> Result<()>;

    /// Samples the next token, or `None` when the engine signals natural
    /// completion.
    fn sample_next(&mut self) -> Result<Option<TokenId>>;

    /// Decodes one token into its text fragment.
    fn detokenize(&mut self, token: TokenId) -> Result<String>;

    /// Discards all retained context (KV cache included).
    fn clear_context(&mut self);
}

/// Constructs a [`NativeEngine`] from derived engine parameters.
///
/// The loader runs on the worker thread during initialize; a load failure
/// is passed through to the caller unchanged.
pub trait EngineLoader: Send + 'static {
    type Engine: NativeEngine;

    fn load(&self, params: &EngineParams) -> Result<Self::Engine>;
}

#[cfg(test)]
/// Recording fake engine.
///
/// Scripted fragments in, feed/clear call log out. Shared by the session
/// and façade tests.
pub(crate) mod fake;
