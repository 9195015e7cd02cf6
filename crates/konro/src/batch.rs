//! Positional batch assembly for the native engine.
//!
//! The engine consumes decode steps as parallel fixed-capacity arrays: one
//! slot per token carrying the token id, its absolute position in the
//! context, the sequence ids it belongs to, and whether the engine should
//! produce logits for it. [`TokenBatch`] owns those arrays and a cursor;
//! the session appends into it, feeds it, and clears it between steps.
//!
//! Appends are bounds-checked against the configured capacity. Writing past
//! capacity is undefined at the native layer, so the check lives here rather
//! than trusting every call site to respect the batch size.

use crate::error::{BridgeError, Result};

/// Token identifier in the engine's vocabulary.
pub type TokenId = i32;

/// One decode step's worth of tokens in the engine's positional format.
///
/// Append-only within a step; [`clear`](TokenBatch::clear) resets the cursor
/// for the next step without releasing the backing storage.
#[derive(Debug)]
pub struct TokenBatch {
    tokens: Vec<TokenId>,
    positions: Vec<i32>,
    sequence_ids: Vec<Vec<i32>>,
    wants_logits: Vec<bool>,
    capacity: usize,
}

impl TokenBatch {
    /// Creates an empty batch holding at most `capacity` tokens.
    pub fn new(capacity: usize) -> Self {
        TokenBatch {
            tokens: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            sequence_ids: Vec::with_capacity(capacity),
            wants_logits: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Writes one token into the next free slot and advances the cursor.
    ///
    /// # Errors
    ///
    /// [`BridgeError::BatchCapacity`] when the batch is already full.
    pub fn push(
        &mut self,
        token: TokenId,
        position: i32,
        sequence_ids: &[i32],
        wants_logits: bool,
    ) -> Result<()> {
        if self.tokens.len() >= self.capacity {
            return Err(BridgeError::BatchCapacity {
                capacity: self.capacity,
            });
        }
        self.tokens.push(token);
        self.positions.push(position);
        self.sequence_ids.push(sequence_ids.to_vec());
        self.wants_logits.push(wants_logits);
        Ok(())
    }

    /// Resets the cursor to zero for the next decode step.
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.positions.clear();
        self.sequence_ids.clear();
        self.wants_logits.clear();
    }

    /// Number of tokens currently in the batch.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the batch holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Maximum number of tokens the batch can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Token ids in slot order.
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    /// Context positions in slot order.
    pub fn positions(&self) -> &[i32] {
        &self.positions
    }

    /// Per-slot sequence-id lists.
    pub fn sequence_ids(&self) -> &[Vec<i32>] {
        &self.sequence_ids
    }

    /// Per-slot emit-logits flags.
    pub fn wants_logits(&self) -> &[bool] {
        &self.wants_logits
    }
}
