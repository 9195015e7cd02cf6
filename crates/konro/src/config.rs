//! Generation configuration and derived engine parameters.
//!
//! [`GenerationConfig`] is a pure value object: it is constructed once per
//! session, never mutated, and has no behavior beyond deriving the
//! parameters the native engine is constructed with.

use std::time::Duration;

/// Floor applied to the configured context size when deriving engine
/// parameters.
const MIN_CONTEXT_SIZE: u32 = 8;

/// Upper bound on the engine thread count regardless of available cores.
const MAX_ENGINE_THREADS: u32 = 6;

/// Immutable sampling and runtime parameters for a generation session.
///
/// Supplied once at construction of the session and never mutated
/// afterward. The stop tokens are ordered, but matching during streaming is
/// by earliest position in the output, not by configuration order.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Sampler seed.
    pub seed: u32,

    /// Top-k sampling cutoff.
    pub top_k: i32,

    /// Nucleus sampling cutoff.
    pub top_p: f32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Requested context window in tokens. Floored at 8 when deriving
    /// engine parameters.
    pub context_size: u32,

    /// Maximum number of tokens to generate per call.
    pub max_tokens: usize,

    /// Number of tokens fed to the engine per decode step.
    pub batch_size: usize,

    /// Substrings whose appearance in generated text truncates output.
    pub stop_tokens: Vec<String>,

    /// Deadline applied to one entire `generate` call (feed and decode
    /// loop included), not to individual decode steps.
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            seed: 0,
            top_k: 40,
            top_p: 0.95,
            temperature: 0.7,
            context_size: 4096,
            max_tokens: 1024,
            batch_size: 512,
            stop_tokens: vec![],
            timeout: Duration::from_secs(120),
        }
    }
}

impl GenerationConfig {
    /// Derives the parameters the native engine is constructed with.
    ///
    /// - thread count: `clamp(available cores − 1, 1, 6)`
    /// - context size: floored at 8
    /// - flash attention: enabled unconditionally
    pub fn engine_params(&self) -> EngineParams {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);

        EngineParams {
            seed: self.seed,
            top_k: self.top_k,
            top_p: self.top_p,
            temperature: self.temperature,
            context_size: self.context_size.max(MIN_CONTEXT_SIZE),
            batch_size: self.batch_size,
            thread_count: cores.saturating_sub(1).clamp(1, MAX_ENGINE_THREADS),
            flash_attention: true,
        }
    }

    /// Character length of the longest configured stop token, or 0 when no
    /// stop tokens are configured.
    pub fn longest_stop_token(&self) -> usize {
        self.stop_tokens
            .iter()
            .map(|t| t.chars().count())
            .max()
            .unwrap_or(0)
    }
}

/// Engine-construction parameters derived from a [`GenerationConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    pub seed: u32,
    pub top_k: i32,
    pub top_p: f32,
    pub temperature: f32,
    pub context_size: u32,
    pub batch_size: usize,
    pub thread_count: u32,
    pub flash_attention: bool,
}
