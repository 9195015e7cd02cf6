//! Scripted fake engine for tests.
//!
//! Tokenizes one id per byte, emits a fixed list of fragments from
//! `sample_next`/`detokenize`, and records feed and clear calls so tests can
//! assert on the exact call sequence, which is how the KV-cache reuse
//! heuristic is verified.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{EngineLoader, NativeEngine};
use crate::batch::{TokenBatch, TokenId};
use crate::config::EngineParams;
use crate::error::{BridgeError, Result};

/// Engine calls recorded by the fake, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Feed(usize),
    Clear,
}

pub(crate) struct FakeEngine {
    fragments: Vec<String>,
    cursor: usize,
    ops: Arc<Mutex<Vec<Op>>>,

    /// Worker-thread sleep injected into every feed, for deadline tests.
    feed_delay: std::time::Duration,

    /// When set, `sample_next` fails once this many fragments were decoded.
    fail_sample_after: Option<usize>,
}

impl NativeEngine for FakeEngine {
    fn tokenize(&self, text: &str) -> Vec<TokenId> {
        (0..text.len() as TokenId).collect()
    }

    fn feed_batch(&mut self, batch: &TokenBatch) -> Result<()> {
        if !self.feed_delay.is_zero() {
            std::thread::sleep(self.feed_delay);
        }
        self.ops.lock().unwrap().push(Op::Feed(batch.len()));
        Ok(())
    }

    fn sample_next(&mut self) -> Result<Option<TokenId>> {
        if self.fail_sample_after.is_some_and(|limit| self.cursor >= limit) {
            return Err(BridgeError::Engine("sample failed".into()));
        }
        if self.cursor < self.fragments.len() {
            Ok(Some(self.cursor as TokenId))
        } else {
            Ok(None)
        }
    }

    fn detokenize(&mut self, token: TokenId) -> Result<String> {
        let fragment = self.fragments[token as usize].clone();
        self.cursor += 1;
        Ok(fragment)
    }

    fn clear_context(&mut self) {
        self.ops.lock().unwrap().push(Op::Clear);
    }
}

pub(crate) struct FakeLoader {
    fragments: Vec<String>,
    pub(crate) ops: Arc<Mutex<Vec<Op>>>,
    pub(crate) loads: Arc<AtomicUsize>,
    pub(crate) fail: bool,
    pub(crate) feed_delay: std::time::Duration,
    pub(crate) fail_sample_after: Option<usize>,
}

impl FakeLoader {
    pub(crate) fn new(fragments: &[&str]) -> Self {
        FakeLoader {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            ops: Arc::new(Mutex::new(vec![])),
            loads: Arc::new(AtomicUsize::new(0)),
            fail: false,
            feed_delay: std::time::Duration::ZERO,
            fail_sample_after: None,
        }
    }
}

impl EngineLoader for FakeLoader {
    type Engine = FakeEngine;

    fn load(&self, _params: &EngineParams) -> Result<FakeEngine> {
        if self.fail {
            return Err(BridgeError::Engine("load failed".into()));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(FakeEngine {
            fragments: self.fragments.clone(),
            cursor: 0,
            ops: self.ops.clone(),
            feed_delay: self.feed_delay,
            fail_sample_after: self.fail_sample_after,
        })
    }
}
