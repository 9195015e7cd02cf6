//! Streaming stop-sequence detection.
//!
//! Generated text arrives as arbitrary fragments, so a configured stop
//! sequence can straddle a fragment boundary. [`StopSequenceFilter`] buffers
//! just enough text to rule that out: it only evaluates for a match once the
//! buffer holds at least twice the longest stop token, and between
//! evaluations it releases only the head of the buffer that can no longer be
//! the start of a match. Lookback is therefore bounded by the stop-token
//! set, not by the length of the output.
//!
//! One filter instance serves exactly one generation call. It is constructed
//! at the start of the call and drained by [`finish`](StopSequenceFilter::finish)
//! at the end, so no streaming state outlives the call that produced it.

/// Result of pushing one fragment through the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStep {
    /// Nothing releasable yet; the fragment was buffered.
    Buffered,

    /// Text cleared for emission; generation continues.
    Released(String),

    /// A stop sequence matched. The carried text is the final emission and
    /// everything from the match onward has been discarded.
    Stopped(String),
}

/// Detects configured stop substrings inside a stream of text fragments and
/// trims emitted output at the first match.
///
/// With no stop tokens configured the filter is a pure passthrough: every
/// fragment is released immediately and unchanged.
#[derive(Debug)]
pub struct StopSequenceFilter {
    stop_tokens: Vec<String>,

    /// Character length of the longest stop token. The buffer must reach
    /// twice this length before a match evaluation is conclusive.
    longest: usize,

    buffer: String,

    /// Gate that suppresses emission of whitespace-only buffered content
    /// until the first non-whitespace text arrives.
    content_started: bool,
}

impl StopSequenceFilter {
    /// Creates a filter for the given stop tokens. Empty stop tokens are
    /// ignored; matching the empty string would truncate all output.
    pub fn new(stop_tokens: &[String]) -> Self {
        let stop_tokens: Vec<String> = stop_tokens
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect();
        let longest = stop_tokens
            .iter()
            .map(|t| t.chars().count())
            .max()
            .unwrap_or(0);

        StopSequenceFilter {
            stop_tokens,
            longest,
            buffer: String::new(),
            content_started: false,
        }
    }

    /// Feeds one fragment into the filter.
    pub fn push(&mut self, fragment: &str) -> FilterStep {
        if self.stop_tokens.is_empty() {
            return FilterStep::Released(fragment.to_string());
        }

        self.buffer.push_str(fragment);

        if !self.content_started {
            if self.buffer.trim().is_empty() {
                return FilterStep::Buffered;
            }
            // Real output begins here; drop the leading whitespace so the
            // consumer never sees a blank prefix.
            self.buffer = self.buffer.trim_start().to_string();
            self.content_started = true;
        }

        let mut released = String::new();
        while self.buffer.chars().count() >= 2 * self.longest {
            if let Some(offset) = self.earliest_match() {
                released.push_str(&self.buffer[..offset]);
                self.buffer.clear();
                return FilterStep::Stopped(released);
            }

            // No complete match in a buffer of at least twice the longest
            // stop token: the first `longest` characters cannot be the
            // start of one, so they are safe to release.
            let cut = self.char_boundary(self.longest);
            released.push_str(&self.buffer[..cut]);
            self.buffer.drain(..cut);
        }

        if released.is_empty() {
            FilterStep::Buffered
        } else {
            FilterStep::Released(released)
        }
    }

    /// Drains the filter at stream end.
    ///
    /// Flushes whatever remains in the buffer, trimmed at the earliest stop
    /// match if one is present, then strips any stop-token substring that
    /// survived. The strip pass covers a stop token that spanned the final
    /// fragment boundary without the buffer ever reaching the evaluation
    /// threshold.
    pub fn finish(&mut self) -> String {
        let mut remainder = std::mem::take(&mut self.buffer);

        if let Some(offset) = self
            .stop_tokens
            .iter()
            .filter_map(|t| remainder.find(t.as_str()))
            .min()
        {
            remainder.truncate(offset);
        }
        for token in &self.stop_tokens {
            if remainder.contains(token.as_str()) {
                remainder = remainder.replace(token.as_str(), "");
            }
        }
        remainder
    }

    /// Byte offset of the earliest stop-token match in the buffer, across
    /// all configured stop tokens. First match wins by position, not by
    /// configuration order.
    fn earliest_match(&self) -> Option<usize> {
        self.stop_tokens
            .iter()
            .filter_map(|t| self.buffer.find(t.as_str()))
            .min()
    }

    /// Byte index of the `n`-th character of the buffer.
    fn char_boundary(&self, n: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(n)
            .map(|(idx, _)| idx)
            .unwrap_or(self.buffer.len())
    }
}
