/// SSE frame parsing and encoding for the upstream completion stream.
///
/// Buffers partial lines across arbitrary byte boundaries and applies the
/// field semantics of the
/// [SSE specification](https://html.spec.whatwg.org/multipage/server-sent-events.html)
/// that matter for OpenAI-style streams: `data:` accumulation, `event:`
/// names, comment lines, and blank-line dispatch.
use super::SseEvent;
use futures_util::Stream;
use memchr::memchr_iter;
use smallvec::SmallVec;

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Incremental SSE line parser.
///
/// Feed it text chunks as they arrive and it yields fully-assembled
/// [`SseEvent`] frames.
pub struct SseParser {
    buffer: String,
    read_offset: usize,
    event_type: Option<String>,
    data: String,
    has_data: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            read_offset: 0,
            event_type: None,
            data: String::new(),
            has_data: false,
        }
    }

    /// Feed raw text and return any complete events parsed.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete events into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseEvent>) {
        self.buffer.push_str(chunk);
        let mut line_start = self.read_offset;
        let scan_start = line_start;
        let bytes = self.buffer.as_bytes();
        for rel in memchr_iter(b'\n', &bytes[scan_start..]) {
            let line_end = scan_start + rel;
            let mut line = &self.buffer[line_start..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            Self::process_line(line, &mut self.event_type, &mut self.data, &mut self.has_data, out);
            line_start = line_end + 1;
        }

        self.read_offset = line_start;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
        } else if self.read_offset >= 4 * 1024 {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    fn process_line(
        line: &str,
        event_type: &mut Option<String>,
        data: &mut String,
        has_data: &mut bool,
        out: &mut Vec<SseEvent>,
    ) {
        if line.is_empty() {
            // Blank line dispatches the pending frame.
            if *has_data {
                out.push(SseEvent {
                    event: event_type.take(),
                    data: std::mem::take(data),
                });
                *has_data = false;
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if *has_data {
                data.push('\n');
            } else {
                *has_data = true;
            }
            data.push_str(value);
        } else if let Some(value) = line.strip_prefix("event:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            *event_type = Some(value.to_string());
        }
        // id:/retry:/unknown fields carry nothing this proxy needs.
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame a JSON payload as one OpenAI-style SSE event.
#[must_use]
pub fn frame(json: &str) -> String {
    let mut out = String::with_capacity(8 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

struct PendingEvents {
    events: SmallVec<[SseEvent; 8]>,
    head: usize,
}

impl PendingEvents {
    fn new() -> Self {
        Self {
            events: SmallVec::new(),
            head: 0,
        }
    }

    fn pop_front(&mut self) -> Option<SseEvent> {
        if self.head >= self.events.len() {
            return None;
        }
        let event = std::mem::take(&mut self.events[self.head]);
        self.head += 1;
        if self.head == self.events.len() {
            self.events.clear();
            self.head = 0;
        }
        Some(event)
    }

    fn extend_from(&mut self, parsed: &mut Vec<SseEvent>) {
        self.events.reserve(parsed.len());
        self.events.extend(parsed.drain(..));
    }
}

/// Split an HTTP body byte stream into SSE events.
///
/// Bytes are decoded as UTF-8 with a remainder carried across chunk
/// boundaries, fed to an [`SseParser`], and complete frames are yielded one
/// at a time.
pub fn event_stream<S, E>(byte_stream: S) -> impl Stream<Item = SseEvent> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Debug + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            SseParser::new(),
            Vec::<u8>::new(),
            Vec::<SseEvent>::with_capacity(8),
            PendingEvents::new(),
        ),
        |(mut stream, mut parser, mut remainder, mut parsed, mut pending)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((event, (stream, parser, remainder, parsed, pending)));
                }

                let chunk = stream.as_mut().next().await?;
                let Ok(bytes) = chunk else {
                    // A failed body read ends the event stream; the caller's
                    // flush still runs.
                    return None;
                };
                remainder.extend_from_slice(&bytes);
                match std::str::from_utf8(&remainder) {
                    Ok(text) => {
                        parser.feed_into(text, &mut parsed);
                        remainder.clear();
                    }
                    Err(err) => {
                        let valid_up_to = err.valid_up_to();
                        if valid_up_to > 0 {
                            // Safety: valid_up_to is a UTF-8 boundary.
                            let text = unsafe {
                                std::str::from_utf8_unchecked(&remainder[..valid_up_to])
                            };
                            parser.feed_into(text, &mut parsed);
                            remainder.copy_within(valid_up_to.., 0);
                            remainder.truncate(remainder.len() - valid_up_to);
                        }
                    }
                }
                if !parsed.is_empty() {
                    pending.extend_from(&mut parsed);
                }
            }
        },
    )
}
