//! Incremental line decoding for streamed provider responses.
//!
//! Bytes are buffered rather than text, so a multi-byte character split across two reads
//! is reassembled before anything is decoded. Only complete `\n`-terminated lines are
//! classified; an unterminated tail is flushed once the reader ends.
//!
//! ```rust
//! use std::ops::ControlFlow;
//!
//! use acommon::CancellationController;
//! use aprovider::{DecodeOutcome, Framing, TransportResponse, decode};
//!
//! # let runtime = tokio::runtime::Runtime::new().expect("runtime");
//! # runtime.block_on(async {
//! let body = TransportResponse::from_chunks(200, [
//!     "data: {\"a\":1}\n\nda",
//!     "ta: [DONE]\n",
//! ])
//! .body;
//! let controller = CancellationController::new();
//! let mut frames = Vec::new();
//!
//! let outcome = decode(body, Framing::Sse, &controller.token(), |frame| {
//!     frames.push(frame.to_vec());
//!     ControlFlow::Continue(())
//! })
//! .await
//! .expect("decode should succeed");
//!
//! assert_eq!(outcome, DecodeOutcome::Done);
//! assert_eq!(frames, vec![b"{\"a\":1}".to_vec()]);
//! # });
//! ```

use std::ops::ControlFlow;

use acommon::CancellationToken;
use futures_util::StreamExt;

use crate::{ByteStream, ProviderError};

const SSE_DATA_PREFIX: &[u8] = b"data:";
const SSE_DONE: &[u8] = b"[DONE]";

/// Longest unterminated line a decoder buffers before giving up on the body.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// How a streamed body delimits its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One JSON document per line.
    NdJson,
    /// Server-sent events; only `data:` lines carry payloads.
    Sse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Frame(&'a [u8]),
    Done,
    Skip,
}

impl Framing {
    pub fn classify(self, line: &[u8]) -> LineKind<'_> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return LineKind::Skip;
        }

        match self {
            Self::NdJson => LineKind::Frame(line),
            Self::Sse => match line.strip_prefix(SSE_DATA_PREFIX) {
                Some(payload) => {
                    let payload = payload.trim_ascii();
                    if payload == SSE_DONE {
                        LineKind::Done
                    } else if payload.is_empty() {
                        LineKind::Skip
                    } else {
                        LineKind::Frame(payload)
                    }
                }
                None => LineKind::Skip,
            },
        }
    }
}

/// Byte buffer that hands out complete lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
    // Bytes already known to contain no `\n`.
    scanned: usize,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line without its `\n` (and trailing `\r`), if one is buffered.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
        else {
            self.scanned = self.buffer.len();
            return None;
        };

        let newline = self.scanned + offset;
        self.scanned = 0;
        let mut line = self.buffer.drain(..=newline).collect::<Vec<_>>();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Takes whatever is left once the input has ended.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }

        self.scanned = 0;
        let mut tail = std::mem::take(&mut self.buffer);
        if tail.last() == Some(&b'\r') {
            tail.pop();
        }
        Some(tail)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    Frame(Vec<u8>),
    /// The stream signalled completion (`data: [DONE]`).
    Done,
    EndOfStream,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    EndOfStream,
    Done,
    Aborted,
}

/// Owns a response body and yields its frames one at a time.
///
/// The reader is released as soon as a terminal step is reached, and on drop.
pub struct StreamDecoder {
    reader: Option<ByteStream>,
    framing: Framing,
    splitter: LineSplitter,
    reader_ended: bool,
    max_line_bytes: usize,
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("framing", &self.framing)
            .field("reader_open", &self.reader.is_some())
            .field("buffered", &self.splitter.buffered_len())
            .finish()
    }
}

impl StreamDecoder {
    pub fn new(reader: ByteStream, framing: Framing) -> Self {
        Self {
            reader: Some(reader),
            framing,
            splitter: LineSplitter::new(),
            reader_ended: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Caps how long a single unterminated line may grow before decoding fails.
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    /// Pulls the next frame, reading more bytes as needed.
    ///
    /// The token is checked before every buffered line and every read; an abort is a step,
    /// not an error. Once a terminal step or an error is returned the reader has been
    /// dropped and every later call reports [`DecodeStep::EndOfStream`].
    pub async fn next_frame(
        &mut self,
        token: &CancellationToken,
    ) -> Result<DecodeStep, ProviderError> {
        loop {
            if token.is_aborted() && !self.is_drained() {
                self.terminate();
                return Ok(DecodeStep::Aborted);
            }

            if let Some(line) = self.splitter.next_line() {
                match self.framing.classify(&line) {
                    LineKind::Frame(payload) => return Ok(DecodeStep::Frame(payload.to_vec())),
                    LineKind::Done => {
                        self.terminate();
                        return Ok(DecodeStep::Done);
                    }
                    LineKind::Skip => continue,
                }
            }

            if self.reader_ended {
                self.release();
                if let Some(tail) = self.splitter.finish() {
                    match self.framing.classify(&tail) {
                        LineKind::Frame(payload) => return Ok(DecodeStep::Frame(payload.to_vec())),
                        LineKind::Done => return Ok(DecodeStep::Done),
                        LineKind::Skip => {}
                    }
                }
                return Ok(DecodeStep::EndOfStream);
            }

            if self.splitter.buffered_len() > self.max_line_bytes {
                let buffered = self.splitter.buffered_len();
                self.terminate();
                return Err(ProviderError::parse(format!(
                    "stream line exceeds {} bytes ({buffered} buffered without a newline)",
                    self.max_line_bytes
                )));
            }

            let Some(reader) = self.reader.as_mut() else {
                self.reader_ended = true;
                continue;
            };

            match reader.next().await {
                Some(Ok(bytes)) => self.splitter.push(&bytes),
                Some(Err(error)) => {
                    self.terminate();
                    return Err(ProviderError::transport(format!(
                        "stream read failed: {}",
                        error.message
                    )));
                }
                None => self.reader_ended = true,
            }
        }
    }

    fn is_drained(&self) -> bool {
        self.reader.is_none() && self.splitter.buffered_len() == 0
    }

    fn release(&mut self) {
        self.reader = None;
    }

    fn terminate(&mut self) {
        self.release();
        self.splitter = LineSplitter::new();
        self.reader_ended = true;
    }
}

/// Callback form of [`StreamDecoder`]. `on_frame` returning [`ControlFlow::Break`] stops
/// reading as if the stream had signalled completion.
pub async fn decode<F>(
    reader: ByteStream,
    framing: Framing,
    token: &CancellationToken,
    mut on_frame: F,
) -> Result<DecodeOutcome, ProviderError>
where
    F: FnMut(&[u8]) -> ControlFlow<()>,
{
    let mut decoder = StreamDecoder::new(reader, framing);

    loop {
        match decoder.next_frame(token).await? {
            DecodeStep::Frame(frame) => {
                if on_frame(&frame).is_break() {
                    return Ok(DecodeOutcome::Done);
                }
            }
            DecodeStep::Done => return Ok(DecodeOutcome::Done),
            DecodeStep::EndOfStream => return Ok(DecodeOutcome::EndOfStream),
            DecodeStep::Aborted => return Ok(DecodeOutcome::Aborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitter_strips_carriage_returns_and_keeps_partial_lines() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"one\r\ntw");

        assert_eq!(splitter.next_line(), Some(b"one".to_vec()));
        assert_eq!(splitter.next_line(), None);

        splitter.push(b"o\n\nthree");
        assert_eq!(splitter.next_line(), Some(b"two".to_vec()));
        assert_eq!(splitter.next_line(), Some(Vec::new()));
        assert_eq!(splitter.next_line(), None);
        assert_eq!(splitter.finish(), Some(b"three".to_vec()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn splitter_finds_newlines_after_many_partial_pushes() {
        let mut splitter = LineSplitter::new();
        for _ in 0..100 {
            splitter.push(b"ab");
            assert_eq!(splitter.next_line(), None);
        }
        splitter.push(b"\nc\n");

        assert_eq!(splitter.next_line(), Some(b"ab".repeat(100)));
        assert_eq!(splitter.next_line(), Some(b"c".to_vec()));
        assert_eq!(splitter.buffered_len(), 0);
    }

    #[test]
    fn sse_classification_only_forwards_data_lines() {
        assert_eq!(Framing::Sse.classify(b"data: {}"), LineKind::Frame(b"{}"));
        assert_eq!(Framing::Sse.classify(b"data:{}"), LineKind::Frame(b"{}"));
        assert_eq!(Framing::Sse.classify(b"data: [DONE]"), LineKind::Done);
        assert_eq!(Framing::Sse.classify(b"event: ping"), LineKind::Skip);
        assert_eq!(Framing::Sse.classify(b": keep-alive"), LineKind::Skip);
        assert_eq!(Framing::Sse.classify(b"   "), LineKind::Skip);
    }

    #[test]
    fn ndjson_classification_forwards_every_non_blank_line() {
        assert_eq!(
            Framing::NdJson.classify(b"{\"type\":\"content\"}"),
            LineKind::Frame(b"{\"type\":\"content\"}")
        );
        assert_eq!(Framing::NdJson.classify(b"data: x"), LineKind::Frame(b"data: x"));
        assert_eq!(Framing::NdJson.classify(b""), LineKind::Skip);
    }
}
