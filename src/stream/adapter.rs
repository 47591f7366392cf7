/// Per-request bridge between the deframed upstream stream and the
/// downstream SSE body.
///
/// Each event is optionally captured to disk, then fed to the rewriter; the
/// payloads it returns are framed as individual SSE events. When the
/// upstream closes, the rewriter is flushed so held-back text is not lost.
use bytes::Bytes;
use futures_util::Stream;

use super::sse;
use super::SseEvent;
use crate::capture::EventCapture;
use crate::rewrite::ToolCallRewriter;

pub struct StreamAdapter {
    rewriter: ToolCallRewriter,
    capture: Option<EventCapture>,
    payloads: Vec<String>,
}

impl StreamAdapter {
    #[must_use]
    pub fn new(capture: Option<EventCapture>) -> Self {
        Self {
            rewriter: ToolCallRewriter::new(),
            capture,
            payloads: Vec::with_capacity(4),
        }
    }

    /// Handle one deframed upstream event, appending framed downstream
    /// events to `out`.
    pub fn process_event(&mut self, event: &SseEvent, out: &mut Vec<Bytes>) {
        if let Some(capture) = &mut self.capture {
            capture.record(&event.data);
        }
        if event.data.is_empty() {
            return;
        }
        if event.is_done() {
            out.push(Bytes::from_static(sse::DONE_FRAME.as_bytes()));
            return;
        }
        self.rewriter.feed_into(&event.data, &mut self.payloads);
        self.frame_payloads(out);
    }

    /// Flush the rewriter at upstream close.
    pub fn finish(&mut self, out: &mut Vec<Bytes>) {
        self.rewriter.flush_into(&mut self.payloads);
        self.frame_payloads(out);
    }

    fn frame_payloads(&mut self, out: &mut Vec<Bytes>) {
        for payload in self.payloads.drain(..) {
            if payload.is_empty() {
                continue;
            }
            out.push(Bytes::from(sse::frame(&payload)));
        }
    }
}

/// Drive `events` through a [`StreamAdapter`] and yield framed downstream
/// SSE bytes, flushing once the upstream ends.
pub fn rewrite_stream<S>(
    events: S,
    capture: Option<EventCapture>,
) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = SseEvent> + Send + 'static,
{
    use futures_util::StreamExt;

    struct State<S> {
        events: std::pin::Pin<Box<S>>,
        adapter: StreamAdapter,
        pending: std::collections::VecDeque<Bytes>,
        scratch: Vec<Bytes>,
        flushed: bool,
    }

    let state = State {
        events: Box::pin(events),
        adapter: StreamAdapter::new(capture),
        pending: std::collections::VecDeque::new(),
        scratch: Vec::with_capacity(4),
        flushed: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((frame, state));
            }
            if state.flushed {
                return None;
            }
            match state.events.as_mut().next().await {
                Some(event) => {
                    state.adapter.process_event(&event, &mut state.scratch);
                }
                None => {
                    state.flushed = true;
                    state.adapter.finish(&mut state.scratch);
                }
            }
            state.pending.extend(state.scratch.drain(..));
        }
    })
}
