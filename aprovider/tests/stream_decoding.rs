use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use acommon::CancellationController;
use aprovider::{
    ByteStream, DecodeOutcome, DecodeStep, Framing, ProviderClient, ProviderDescriptor,
    ProviderError, ProviderErrorKind, StreamDecoder, StreamFrame, decode,
};
use futures_core::Stream;

/// Byte stream that records how many chunks were pulled and whether it was dropped.
struct TrackedStream {
    chunks: Vec<Result<Vec<u8>, ProviderError>>,
    reads: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl TrackedStream {
    fn boxed(
        chunks: Vec<Result<Vec<u8>, ProviderError>>,
    ) -> (ByteStream, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicBool::new(false));
        let mut chunks = chunks;
        chunks.reverse();
        let stream = Self {
            chunks,
            reads: Arc::clone(&reads),
            dropped: Arc::clone(&dropped),
        };
        (Box::pin(stream), reads, dropped)
    }
}

impl Stream for TrackedStream {
    type Item = Result<Vec<u8>, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(self.chunks.pop())
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

fn split_at(bytes: &[u8], offset: usize) -> ByteStream {
    let (head, tail) = bytes.split_at(offset);
    TrackedStream::boxed(vec![Ok(head.to_vec()), Ok(tail.to_vec())]).0
}

async fn collect_frames(reader: ByteStream, client: &ProviderClient) -> Vec<StreamFrame> {
    let controller = CancellationController::new();
    let mut frames = Vec::new();
    decode(reader, client.descriptor().framing, &controller.token(), |payload| {
        let frame = client.parse_stream_frame(payload);
        if frame == StreamFrame::Done {
            return ControlFlow::Break(());
        }
        if frame != StreamFrame::Ignorable {
            frames.push(frame);
        }
        ControlFlow::Continue(())
    })
    .await
    .expect("decode should succeed");
    frames
}

#[tokio::test]
async fn sse_frames_are_identical_for_every_split_offset() {
    let client = ProviderClient::new(ProviderDescriptor::groq());
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hé\"}}]}\r\n\r\n: keep-alive\n\
                event: message\n\
                data: {\"choices\":[{\"delta\":{\"reasoning\":\"think\",\"content\":\" there\"}}]}\n\n\
                data: not json\n\
                data: [DONE]\n\
                data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n"
        .as_bytes();

    let expected = collect_frames(TrackedStream::boxed(vec![Ok(body.to_vec())]).0, &client).await;
    assert_eq!(
        expected,
        vec![
            StreamFrame::content("Hé"),
            StreamFrame::delta(" there", "think"),
        ]
    );

    for offset in 0..=body.len() {
        let frames = collect_frames(split_at(body, offset), &client).await;
        assert_eq!(frames, expected, "split at byte {offset}");
    }
}

#[tokio::test]
async fn ndjson_frames_are_identical_for_every_split_offset() {
    let client = ProviderClient::new(ProviderDescriptor::groq_relay("http://localhost"));
    let body = "{\"type\":\"reasoning\",\"data\":\"plan\"}\n\
                {\"type\":\"content\",\"data\":\"日本\"}\n\
                \n\
                {broken\n\
                {\"type\":\"content\",\"data\":\" done\"}"
        .as_bytes();

    let expected = vec![
        StreamFrame::reasoning("plan"),
        StreamFrame::content("日本"),
        StreamFrame::content(" done"),
    ];

    for offset in 0..=body.len() {
        let frames = collect_frames(split_at(body, offset), &client).await;
        assert_eq!(frames, expected, "split at byte {offset}");
    }
}

#[tokio::test]
async fn abort_stops_reading_and_releases_the_reader() {
    let controller = CancellationController::new();
    let token = controller.token();
    let (reader, reads, dropped) = TrackedStream::boxed(vec![
        Ok(b"{\"type\":\"content\",\"data\":\"a\"}\n".to_vec()),
        Ok(b"{\"type\":\"content\",\"data\":\"b\"}\n".to_vec()),
        Ok(b"{\"type\":\"content\",\"data\":\"c\"}\n".to_vec()),
    ]);
    let mut decoder = StreamDecoder::new(reader, Framing::NdJson);

    let first = decoder.next_frame(&token).await.expect("first frame");
    assert!(matches!(first, DecodeStep::Frame(_)));

    controller.cancel();
    let step = decoder.next_frame(&token).await.expect("abort is not an error");

    assert_eq!(step, DecodeStep::Aborted);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert!(decoder.is_released());
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(
        decoder.next_frame(&token).await.expect("terminal"),
        DecodeStep::EndOfStream
    );
}

#[tokio::test]
async fn read_errors_are_transport_errors_and_keep_earlier_frames() {
    let controller = CancellationController::new();
    let (reader, _, dropped) = TrackedStream::boxed(vec![
        Ok(b"data: one\n".to_vec()),
        Err(ProviderError::timeout("connection reset")),
    ]);
    let mut seen = Vec::new();

    let error = decode(reader, Framing::Sse, &controller.token(), |frame| {
        seen.push(frame.to_vec());
        ControlFlow::Continue(())
    })
    .await
    .expect_err("read error must surface");

    assert_eq!(error.kind, ProviderErrorKind::Transport);
    assert_eq!(seen, vec![b"one".to_vec()]);
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn done_marker_ends_decoding_and_releases_the_reader() {
    let controller = CancellationController::new();
    let (reader, _, dropped) =
        TrackedStream::boxed(vec![Ok(b"data: a\ndata: [DONE]\ndata: b\n".to_vec())]);

    let mut seen = Vec::new();
    let outcome = decode(reader, Framing::Sse, &controller.token(), |frame| {
        seen.push(frame.to_vec());
        ControlFlow::Continue(())
    })
    .await
    .expect("decode should succeed");

    assert_eq!(outcome, DecodeOutcome::Done);
    assert_eq!(seen, vec![b"a".to_vec()]);
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn cancel_inside_callback_stops_buffered_frames() {
    let controller = CancellationController::new();
    let token = controller.token();
    let (reader, reads, dropped) =
        TrackedStream::boxed(vec![Ok(b"data: a\ndata: b\ndata: c\ndata: d\n".to_vec())]);

    let mut seen = Vec::new();
    let outcome = decode(reader, Framing::Sse, &token, |frame| {
        seen.push(frame.to_vec());
        controller.cancel();
        ControlFlow::Continue(())
    })
    .await
    .expect("abort is not an error");

    assert_eq!(outcome, DecodeOutcome::Aborted);
    assert_eq!(seen, vec![b"a".to_vec()]);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn unterminated_line_past_the_limit_is_a_parse_error() {
    let controller = CancellationController::new();
    let (reader, reads, dropped) = TrackedStream::boxed(vec![
        Ok(b"data: ok\n".to_vec()),
        Ok(vec![b'x'; 40]),
        Ok(vec![b'x'; 40]),
        Ok(b"\n".to_vec()),
    ]);
    let mut decoder = StreamDecoder::new(reader, Framing::Sse).with_max_line_bytes(64);

    assert_eq!(
        decoder.next_frame(&controller.token()).await.expect("first frame"),
        DecodeStep::Frame(b"ok".to_vec())
    );
    let error = decoder
        .next_frame(&controller.token())
        .await
        .expect_err("oversized line must fail");

    assert_eq!(error.kind, ProviderErrorKind::Parse);
    assert_eq!(reads.load(Ordering::SeqCst), 3);
    assert!(decoder.is_released());
    assert!(dropped.load(Ordering::SeqCst));
}
