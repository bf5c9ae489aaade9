//! Simulated streaming for providers that only return complete responses.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use acommon::CancellationController;
//! use achat::{SyntheticStep, SyntheticStream};
//!
//! # let runtime = tokio::runtime::Runtime::new().expect("runtime");
//! # runtime.block_on(async {
//! let controller = CancellationController::new();
//! let mut stream = SyntheticStream::new("The quick brown fox", Duration::ZERO);
//! let mut rebuilt = String::new();
//!
//! while let SyntheticStep::Chunk(chunk) = stream.next_chunk(&controller.token()).await {
//!     rebuilt.push_str(chunk);
//! }
//!
//! assert_eq!(rebuilt, "The quick brown fox");
//! # });
//! ```

use std::str::SplitInclusive;
use std::time::Duration;

use acommon::CancellationToken;
use futures_timer::Delay;

pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(30);

/// Word-sized pieces that concatenate back to `text` exactly.
pub fn word_chunks(text: &str) -> SplitInclusive<'_, char> {
    text.split_inclusive(' ')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticStep<'a> {
    Chunk(&'a str),
    Finished,
    Aborted,
}

#[derive(Debug)]
pub struct SyntheticStream<'a> {
    chunks: SplitInclusive<'a, char>,
    delay: Duration,
    emitted: usize,
}

impl<'a> SyntheticStream<'a> {
    /// A zero `delay` emits chunks without sleeping.
    pub fn new(text: &'a str, delay: Duration) -> Self {
        Self {
            chunks: word_chunks(text),
            delay,
            emitted: 0,
        }
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Next chunk after the inter-chunk delay. The token is checked before and after
    /// sleeping so a stop never waits for, or emits, another chunk.
    pub async fn next_chunk(&mut self, token: &CancellationToken) -> SyntheticStep<'a> {
        if token.is_aborted() {
            return SyntheticStep::Aborted;
        }

        let Some(chunk) = self.chunks.next() else {
            return SyntheticStep::Finished;
        };

        if self.emitted > 0 && !self.delay.is_zero() {
            Delay::new(self.delay).await;
            if token.is_aborted() {
                return SyntheticStep::Aborted;
            }
        }

        self.emitted += 1;
        SyntheticStep::Chunk(chunk)
    }
}

#[cfg(test)]
mod tests {
    use acommon::CancellationController;

    use super::*;

    #[test]
    fn word_chunks_are_lossless() {
        for text in ["The quick brown fox", "  leading", "trailing  ", "", "one", "a  b"] {
            assert_eq!(word_chunks(text).collect::<String>(), text);
        }
        assert_eq!(
            word_chunks("The quick brown fox").collect::<Vec<_>>(),
            vec!["The ", "quick ", "brown ", "fox"]
        );
    }

    #[tokio::test]
    async fn cancelled_streams_stop_before_the_next_chunk() {
        let controller = CancellationController::new();
        let token = controller.token();
        let mut stream = SyntheticStream::new("one two three", Duration::from_millis(1));

        assert_eq!(stream.next_chunk(&token).await, SyntheticStep::Chunk("one "));
        controller.cancel();
        assert_eq!(stream.next_chunk(&token).await, SyntheticStep::Aborted);
        assert_eq!(stream.emitted(), 1);
    }

    #[tokio::test]
    async fn empty_text_finishes_immediately() {
        let controller = CancellationController::new();
        let mut stream = SyntheticStream::new("", DEFAULT_CHUNK_DELAY);
        assert_eq!(stream.next_chunk(&controller.token()).await, SyntheticStep::Finished);
    }
}
