//! Generation session lifecycle and the decode loop.
//!
//! [`InferenceSession`] owns the native engine handle for its whole
//! lifetime: the handle is created lazily on the first successful
//! initialize, dropped with the session, and touched only from the worker
//! thread the session lives on. The session is always driven through
//! [`WorkerExecutor`](crate::executor::WorkerExecutor) closures; nothing in
//! here synchronizes, because nothing in here is ever reached from two
//! threads.
//!
//! # KV-cache reuse
//!
//! The engine retains per-token attention state that stays valid while the
//! token prefix is unchanged. The session fingerprints the system prompt of
//! each request: an unchanged fingerprint skips the pre-feed context clear
//! so the previously encoded system-prompt prefix can be reused, a changed
//! one clears first. After every generation attempt the context is cleared
//! unconditionally to bound growth across turns, which leaves the cache-hit
//! branch inert in steady state. That mirrors the observed behavior of the
//! engine surface, which only offers a whole-context clear; skipping the
//! final clear would leave stale turn history in the context instead.
//!
//! A generation that fails partway gets the same cleanup, plus the stored
//! fingerprint is dropped: the failed call tore the context down mid-prompt,
//! so the next call must not take a cache hit against it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::batch::TokenBatch;
use crate::config::GenerationConfig;
use crate::engine::{EngineLoader, NativeEngine};
use crate::error::{BridgeError, Result};
use crate::request::GenerationRequest;
use crate::stop::{FilterStep, StopSequenceFilter};

/// One conversation's engine state: configuration, the (lazily created)
/// engine handle, and the system-prompt fingerprint of the previous turn.
pub struct InferenceSession<L: EngineLoader> {
    config: GenerationConfig,
    loader: L,
    engine: Option<L::Engine>,

    /// Fingerprint of the previous turn's system prompt. `None` until the
    /// first generation completes.
    last_system_fingerprint: Option<u64>,

    /// Reused across decode steps; cleared between them.
    batch: TokenBatch,
}

impl<L: EngineLoader> InferenceSession<L> {
    pub fn new(config: GenerationConfig, loader: L) -> Self {
        let batch = TokenBatch::new(config.batch_size.max(1));
        InferenceSession {
            config,
            loader,
            engine: None,
            last_system_fingerprint: None,
            batch,
        }
    }

    /// Constructs the engine from the derived parameters.
    ///
    /// Idempotent: once a handle exists this is a no-op, so a second call
    /// never reloads and never fails.
    pub fn initialize(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }
        let params = self.config.engine_params();
        tracing::info!(
            context_size = params.context_size,
            threads = params.thread_count,
            "loading engine"
        );
        self.engine = Some(self.loader.load(&params)?);
        Ok(())
    }

    /// Whether a successful initialize has happened.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Runs one full generation: cache decision, prompt feed, decode loop,
    /// and post-generation cleanup.
    ///
    /// Fragments released by the stop filter are handed to `on_fragment` as
    /// they appear and also accumulated into the returned string. The
    /// filter (and with it all streaming state) is local to this call.
    ///
    /// Cleanup runs on failure too: the context is cleared and the stored
    /// fingerprint dropped before the error is returned.
    pub fn generate<F>(&mut self, request: &GenerationRequest, on_fragment: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        let engine = self
            .engine
            .as_mut()
            .ok_or(BridgeError::ModelNotInitialized)?;

        let fingerprint = fingerprint(&request.system_prompt);
        if self.last_system_fingerprint == Some(fingerprint) {
            tracing::debug!("system prompt unchanged, reusing engine context");
        } else {
            tracing::debug!("system prompt changed, clearing engine context");
            engine.clear_context();
        }

        let result = run_generation(engine, &self.config, &mut self.batch, request, on_fragment);

        // Bound context growth across turns, success or failure. See the
        // module docs for why this clear is unconditional.
        engine.clear_context();
        match result {
            Ok(output) => {
                self.last_system_fingerprint = Some(fingerprint);
                Ok(output)
            }
            Err(error) => {
                // The failed call left and then tore down a partial
                // context; a same-prompt cache hit must not reuse it.
                self.last_system_fingerprint = None;
                tracing::warn!(%error, "generation failed, engine context discarded");
                Err(error)
            }
        }
    }
}

/// Feed and decode for one request.
///
/// Context cleanup and fingerprint bookkeeping stay with the caller so they
/// also run when this returns an error.
fn run_generation<E, F>(
    engine: &mut E,
    config: &GenerationConfig,
    batch: &mut TokenBatch,
    request: &GenerationRequest,
    mut on_fragment: F,
) -> Result<String>
where
    E: NativeEngine,
    F: FnMut(&str),
{
    // Feed the rendered prompt in batch-sized decode steps. Logits are
    // only requested for the very last prompt token.
    let prompt = request.render_prompt();
    let tokens = engine.tokenize(&prompt);
    let total = tokens.len();
    let mut position: i32 = 0;
    for chunk in tokens.chunks(config.batch_size.max(1)) {
        batch.clear();
        for token in chunk {
            let is_final = position as usize == total - 1;
            batch.push(*token, position, &[0], is_final)?;
            position += 1;
        }
        engine.feed_batch(batch)?;
    }

    // Decode until the engine signals completion, the token budget runs
    // out, or the filter matches a stop sequence.
    let mut filter = StopSequenceFilter::new(&config.stop_tokens);
    let mut output = String::new();
    let mut produced = 0usize;
    while produced < config.max_tokens {
        let Some(token) = engine.sample_next()? else {
            break;
        };
        produced += 1;

        let fragment = engine.detokenize(token)?;
        match filter.push(&fragment) {
            FilterStep::Buffered => {}
            FilterStep::Released(text) => {
                on_fragment(&text);
                output.push_str(&text);
            }
            FilterStep::Stopped(text) => {
                if !text.is_empty() {
                    on_fragment(&text);
                    output.push_str(&text);
                }
                break;
            }
        }
    }

    // Final flush: buffered text with stop tokens stripped.
    let tail = filter.finish();
    if !tail.is_empty() {
        on_fragment(&tail);
        output.push_str(&tail);
    }

    tracing::debug!(tokens = produced, chars = output.len(), "generation finished");
    Ok(output)
}

/// Cheap hash used to detect whether the system prompt changed between
/// turns.
fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
