/// Incremental rewriter for token-delimited tool calls.
///
/// Consumes decoded upstream SSE payloads one at a time, tracks a parser
/// state across chunk boundaries, and produces OpenAI-format payloads:
/// content deltas for free text, a header chunk per tool call, argument
/// deltas for the bytes between `<|tool_call_argument_begin|>` and
/// `<|tool_call_end|>`, and an empty-delta finish chunk.
///
/// Delimiters may arrive split across arbitrary byte boundaries, so text is
/// held back until it provably cannot be part of a delimiter: every
/// delimiter starts with `<` and contains `<` nowhere else, which means the
/// span from the last unresolved `<` onward is the only ambiguous suffix.
///
/// One rewriter serves exactly one downstream response and is driven by the
/// single task draining that response's upstream stream.
use memchr::memmem;

use super::chunk::StreamChunk;
use super::emit;
use super::tokens;

/// Soft cap on text carried across chunk boundaries. A buffer that grows
/// past this without resolving a delimiter is flushed as plain content and
/// the parser starts over.
const MAX_HELD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// Outside any tool-call section.
    Idle,
    /// After `<|tool_calls_section_begin|>`, between calls.
    InSection,
    /// Accumulating the identifier between `<|tool_call_begin|>` and
    /// `<|tool_call_argument_begin|>`.
    ReadingId,
    /// Streaming argument bytes until `<|tool_call_end|>`.
    ReadingArgs,
    /// After `<|tool_calls_section_end|>`; terminal for this response.
    Trailing,
}

pub struct ToolCallRewriter {
    state: ParserState,
    /// Unflushed reasoning text carried across upstream chunks. Quiescent
    /// invariant: empty, or a strict prefix of an unfinished
    /// delimiter/identifier/argument span.
    buf: String,
    /// Zero-based position of the next tool call, monotonically increasing
    /// over the rewriter's lifetime.
    tool_index: u32,
    /// Raw identifier bytes accumulated while in `ReadingId`.
    current_id: String,
    /// Rebased copy of the most recent chunk that had choices; emissions
    /// produced by `flush` reuse its identification fields.
    template: Option<StreamChunk>,
}

impl ToolCallRewriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParserState::Idle,
            buf: String::new(),
            tool_index: 0,
            current_id: String::new(),
            template: None,
        }
    }

    /// Consume one upstream `data` payload and append the encoded downstream
    /// payloads it produces to `out`.
    pub fn feed_into(&mut self, payload: &str, out: &mut Vec<String>) {
        let Ok(mut chunk) = StreamChunk::decode(payload) else {
            // Unparseable payloads are forwarded opaquely; state untouched.
            out.push(payload.to_string());
            return;
        };

        // Some upstreams misplace finish_reason inside the delta; promote it
        // onto the choice before anything else looks at it.
        let mut promoted = false;
        if let Some(choice) = chunk.choices.first_mut() {
            if let Some(reason) = choice.delta.finish_reason.take() {
                choice.finish_reason = Some(reason);
                promoted = true;
            }
        }

        let Some(choice) = chunk.choices.first() else {
            // Usage-only frame.
            out.push(payload.to_string());
            return;
        };

        // Already-structured tool calls pass through untouched.
        if choice
            .delta
            .tool_calls
            .as_ref()
            .is_some_and(|calls| !calls.is_empty())
        {
            self.remember_template(&chunk);
            out.push(if promoted {
                chunk.encode()
            } else {
                payload.to_string()
            });
            return;
        }

        let text = pick_reasoning(&chunk);

        if self.state == ParserState::Idle
            && self.buf.is_empty()
            && !tokens::contains_call_token(text)
        {
            // Fast path: nothing to rewrite, nothing held back.
            out.push(if promoted {
                chunk.encode()
            } else {
                payload.to_string()
            });
            return;
        }

        let finish_reason = choice
            .finish_reason
            .clone()
            .filter(|reason| !reason.is_empty());
        let text = text.to_string();
        self.remember_template(&chunk);

        self.buf.push_str(&text);
        if self.buf.len() > MAX_HELD_BYTES {
            self.overflow(out);
        } else {
            self.advance(out);
        }

        if let Some(reason) = finish_reason {
            self.drain(out);
            if let Some(template) = &self.template {
                out.push(emit::finish_chunk(template, &reason));
            }
        }
    }

    /// Convenience wrapper over [`Self::feed_into`].
    #[must_use]
    pub fn feed(&mut self, payload: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.feed_into(payload, &mut out);
        out
    }

    /// End-of-stream flush: emit whatever is still held, as content or as an
    /// argument delta depending on the parser state. Never synthesizes
    /// closing delimiters.
    pub fn flush_into(&mut self, out: &mut Vec<String>) {
        self.drain(out);
    }

    /// Convenience wrapper over [`Self::flush_into`].
    #[must_use]
    pub fn flush(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        self.flush_into(&mut out);
        out
    }

    fn remember_template(&mut self, chunk: &StreamChunk) {
        let mut template = chunk.rebase();
        // The terminal marker is emitted separately; intermediate emissions
        // derived from a finishing chunk must not repeat it.
        template.choices[0].finish_reason = None;
        self.template = Some(template);
    }

    /// Run the state machine over `buf` until it needs more input.
    fn advance(&mut self, out: &mut Vec<String>) {
        loop {
            match self.state {
                ParserState::Idle => {
                    let Some(at) = find(&self.buf, tokens::SECTION_BEGIN) else {
                        // Text is held until it provably is not a section
                        // opener split across chunks.
                        return;
                    };
                    if at > 0 {
                        self.emit_content_range(out, 0, at);
                    }
                    self.discard(at + tokens::SECTION_BEGIN.len());
                    self.state = ParserState::InSection;
                }
                ParserState::InSection => {
                    self.strip_leading_whitespace();
                    let call = find(&self.buf, tokens::CALL_BEGIN);
                    let end = find(&self.buf, tokens::SECTION_END);
                    match (call, end) {
                        (call, Some(end)) if call.is_none_or(|call| end < call) => {
                            let trailing = self.buf.split_off(end + tokens::SECTION_END.len());
                            self.buf.clear();
                            self.state = ParserState::Trailing;
                            if !trailing.is_empty() {
                                self.emit_content(out, &trailing);
                            }
                            return;
                        }
                        (Some(call), _) => {
                            self.discard(call + tokens::CALL_BEGIN.len());
                            self.current_id.clear();
                            self.state = ParserState::ReadingId;
                        }
                        _ => return,
                    }
                }
                ParserState::ReadingId => {
                    if let Some(at) = find(&self.buf, tokens::ARGUMENT_BEGIN) {
                        self.current_id.push_str(&self.buf[..at]);
                        self.discard(at + tokens::ARGUMENT_BEGIN.len());
                        let raw = std::mem::take(&mut self.current_id);
                        let id = tokens::tool_call_id(&raw, self.tool_index);
                        if let Some(template) = &self.template {
                            out.push(emit::tool_call_header(
                                template,
                                &id,
                                self.tool_index,
                                tokens::function_name(&raw),
                            ));
                        }
                        self.state = ParserState::ReadingArgs;
                    } else {
                        // Move everything that cannot be a delimiter prefix
                        // into the identifier accumulator.
                        match tokens::last_possible_token_start(&self.buf) {
                            Some(at) => {
                                self.current_id.push_str(&self.buf[..at]);
                                self.discard(at);
                            }
                            None => {
                                self.current_id.push_str(&self.buf);
                                self.buf.clear();
                            }
                        }
                        return;
                    }
                }
                ParserState::ReadingArgs => {
                    if let Some(at) = find(&self.buf, tokens::CALL_END) {
                        if at > 0 {
                            self.emit_arguments_range(out, at);
                        }
                        self.discard(at + tokens::CALL_END.len());
                        self.tool_index += 1;
                        self.state = ParserState::InSection;
                    } else {
                        match tokens::last_possible_token_start(&self.buf) {
                            Some(0) => {}
                            Some(at) => self.emit_arguments_range(out, at),
                            None => {
                                if !self.buf.is_empty() {
                                    let len = self.buf.len();
                                    self.emit_arguments_range(out, len);
                                }
                            }
                        }
                        return;
                    }
                }
                ParserState::Trailing => {
                    // The upstream template produces at most one section per
                    // response; everything after it is plain content.
                    if !self.buf.is_empty() {
                        let trailing = std::mem::take(&mut self.buf);
                        self.emit_content(out, &trailing);
                    }
                    return;
                }
            }
        }
    }

    /// Emit held text in whatever shape the current state calls for and
    /// clear the buffer. Used by finish handling and end-of-stream flush.
    fn drain(&mut self, out: &mut Vec<String>) {
        if self.state == ParserState::ReadingId && !self.current_id.is_empty() {
            // Re-join the partially accumulated identifier so no upstream
            // bytes are silently dropped.
            let mut held = std::mem::take(&mut self.current_id);
            held.push_str(&self.buf);
            self.buf = held;
        }
        if self.buf.is_empty() {
            return;
        }
        let held = std::mem::take(&mut self.buf);
        match self.state {
            ParserState::ReadingArgs => {
                if let Some(template) = &self.template {
                    out.push(emit::arguments_delta(template, self.tool_index, &held));
                }
            }
            _ => self.emit_content(out, &held),
        }
    }

    /// Soft-cap fallback: emit the whole buffer as content and start over.
    fn overflow(&mut self, out: &mut Vec<String>) {
        if !self.current_id.is_empty() {
            let mut held = std::mem::take(&mut self.current_id);
            held.push_str(&self.buf);
            self.buf = held;
        }
        let held = std::mem::take(&mut self.buf);
        self.emit_content(out, &held);
        self.state = ParserState::Idle;
    }

    fn emit_content(&self, out: &mut Vec<String>, text: &str) {
        if let Some(template) = &self.template {
            out.push(emit::content_chunk(template, text));
        }
    }

    fn emit_content_range(&self, out: &mut Vec<String>, from: usize, to: usize) {
        if let Some(template) = &self.template {
            out.push(emit::content_chunk(template, &self.buf[from..to]));
        }
    }

    fn emit_arguments_range(&mut self, out: &mut Vec<String>, to: usize) {
        if let Some(template) = &self.template {
            out.push(emit::arguments_delta(
                template,
                self.tool_index,
                &self.buf[..to],
            ));
        }
        self.discard(to);
    }

    #[inline]
    fn discard(&mut self, up_to: usize) {
        self.buf.drain(..up_to);
    }

    fn strip_leading_whitespace(&mut self) {
        let trimmed = self
            .buf
            .trim_start_matches(|c: char| c.is_ascii_whitespace());
        let stripped = self.buf.len() - trimmed.len();
        if stripped > 0 {
            self.discard(stripped);
        }
    }
}

impl Default for ToolCallRewriter {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn find(haystack: &str, needle: &str) -> Option<usize> {
    memmem::find(haystack.as_bytes(), needle.as_bytes())
}

/// First non-empty of `reasoning` / `reasoning_content`; both carry the same
/// text when present together, so only one is consumed.
fn pick_reasoning(chunk: &StreamChunk) -> &str {
    let delta = &chunk.choices[0].delta;
    delta
        .reasoning
        .as_deref()
        .filter(|text| !text.is_empty())
        .or_else(|| {
            delta
                .reasoning_content
                .as_deref()
                .filter(|text| !text.is_empty())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::chunk::StreamChunk;

    fn reasoning_payload(text: &str) -> String {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 123,
            "model": "test",
            "choices": [{"index": 0, "delta": {"reasoning": text}}]
        })
        .to_string()
    }

    fn finish_payload(reason: &str) -> String {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 123,
            "model": "test",
            "choices": [{"index": 0, "delta": {"finish_reason": reason}}]
        })
        .to_string()
    }

    fn decode_all(payloads: &[String]) -> Vec<StreamChunk> {
        payloads
            .iter()
            .map(|p| StreamChunk::decode(p).expect("decode emitted payload"))
            .collect()
    }

    fn content_of(chunk: &StreamChunk) -> Option<&str> {
        chunk.choices[0].delta.content.as_deref()
    }

    #[test]
    fn plain_text_passes_through_verbatim() {
        let mut rewriter = ToolCallRewriter::new();
        let payload = reasoning_payload("just thinking");
        let out = rewriter.feed(&payload);
        assert_eq!(out, vec![payload]);
    }

    #[test]
    fn literal_angle_bracket_text_passes_through() {
        let mut rewriter = ToolCallRewriter::new();
        for fragment in ["if x <", " 5 then"] {
            let payload = reasoning_payload(fragment);
            let out = rewriter.feed(&payload);
            assert_eq!(out, vec![payload], "fragment {fragment:?}");
        }
    }

    #[test]
    fn single_call_in_one_chunk() {
        let mut rewriter = ToolCallRewriter::new();
        let out = rewriter.feed(&reasoning_payload(
            "Pre <|tool_calls_section_begin|><|tool_call_begin|>functions.bash:1<|tool_call_argument_begin|>{\"cmd\":\"ls\"}<|tool_call_end|><|tool_calls_section_end|> Post",
        ));
        let chunks = decode_all(&out);
        assert_eq!(chunks.len(), 4);
        assert_eq!(content_of(&chunks[0]), Some("Pre "));

        let header = &chunks[1].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(header.kind.as_deref(), Some("function"));
        assert_eq!(header.index, 0);
        assert_eq!(header.function.name.as_deref(), Some("bash"));
        assert_eq!(header.function.arguments.as_deref(), Some(""));
        assert!(header.id.as_deref().unwrap().starts_with("call_0_"));

        let args = &chunks[2].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert!(args.id.is_none());
        assert_eq!(args.function.arguments.as_deref(), Some("{\"cmd\":\"ls\"}"));

        assert_eq!(content_of(&chunks[3]), Some(" Post"));
    }

    #[test]
    fn call_prefixed_identifier_is_kept_verbatim() {
        let mut rewriter = ToolCallRewriter::new();
        let out = rewriter.feed(&reasoning_payload(
            "<|tool_calls_section_begin|><|tool_call_begin|>call_xyz<|tool_call_argument_begin|>{}<|tool_call_end|><|tool_calls_section_end|>",
        ));
        let chunks = decode_all(&out);
        let header = &chunks[0].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(header.id.as_deref(), Some("call_xyz"));
    }

    #[test]
    fn delimiters_split_across_chunks() {
        let mut rewriter = ToolCallRewriter::new();
        let fragments = [
            "<|tool_calls_",
            "section_begin|>",
            "<|tool_call_begin|>my.func:1<|tool_call_argument_begin|>",
            "{}",
            "<|tool_call_end|>",
            "<|tool_calls_section_end|>",
        ];
        let mut emitted = Vec::new();
        for fragment in fragments {
            emitted.extend(rewriter.feed(&reasoning_payload(fragment)));
        }
        let chunks = decode_all(&emitted);
        assert_eq!(chunks.len(), 2);
        let header = &chunks[0].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(header.function.name.as_deref(), Some("func"));
        let args = &chunks[1].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(args.function.arguments.as_deref(), Some("{}"));
    }

    #[test]
    fn streamed_arguments_concatenate_exactly() {
        let mut rewriter = ToolCallRewriter::new();
        let mut emitted = Vec::new();
        emitted.extend(rewriter.feed(&reasoning_payload(
            "Thinking... <|tool_calls_section_begin|><|tool_call_begin|>bash:1<|tool_call_argument_begin|>",
        )));
        emitted.extend(rewriter.feed(&reasoning_payload("{\"cmd\"")));
        emitted.extend(rewriter.feed(&reasoning_payload(": \"ls\"}")));
        emitted.extend(rewriter.feed(&reasoning_payload(
            "<|tool_call_end|><|tool_calls_section_end|> Done!",
        )));

        let chunks = decode_all(&emitted);
        assert_eq!(content_of(&chunks[0]), Some("Thinking... "));
        let header = &chunks[1].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(header.function.name.as_deref(), Some("bash"));

        let arg_text: String = chunks[2..chunks.len() - 1]
            .iter()
            .filter_map(|c| {
                c.choices[0].delta.tool_calls.as_ref().and_then(|calls| {
                    calls[0].function.arguments.clone()
                })
            })
            .collect();
        assert_eq!(arg_text, "{\"cmd\": \"ls\"}");
        assert_eq!(content_of(chunks.last().unwrap()), Some(" Done!"));
    }

    #[test]
    fn two_calls_share_one_section_with_monotonic_indices() {
        let mut rewriter = ToolCallRewriter::new();
        let out = rewriter.feed(&reasoning_payload(
            "<|tool_calls_section_begin|><|tool_call_begin|>a:1<|tool_call_argument_begin|>{}<|tool_call_end|><|tool_call_begin|>b:2<|tool_call_argument_begin|>{}<|tool_call_end|><|tool_calls_section_end|>",
        ));
        let chunks = decode_all(&out);
        assert_eq!(chunks.len(), 4);
        let first = &chunks[0].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        let second = &chunks[2].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.function.name.as_deref(), Some("a"));
        assert_eq!(second.index, 1);
        assert_eq!(second.function.name.as_deref(), Some("b"));
        for (at, expected_index) in [(1usize, 0u32), (3, 1)] {
            let args = &chunks[at].choices[0].delta.tool_calls.as_ref().unwrap()[0];
            assert_eq!(args.index, expected_index);
            assert_eq!(args.function.arguments.as_deref(), Some("{}"));
        }
    }

    #[test]
    fn empty_section_emits_nothing_but_keeps_trailing_text() {
        let mut rewriter = ToolCallRewriter::new();
        let out = rewriter.feed(&reasoning_payload(
            "<|tool_calls_section_begin|><|tool_calls_section_end|>after",
        ));
        let chunks = decode_all(&out);
        assert_eq!(chunks.len(), 1);
        assert_eq!(content_of(&chunks[0]), Some("after"));
    }

    #[test]
    fn finish_mid_arguments_drains_then_finishes() {
        let mut rewriter = ToolCallRewriter::new();
        let mut emitted = rewriter.feed(&reasoning_payload(
            "<|tool_calls_section_begin|><|tool_call_begin|>bash:1<|tool_call_argument_begin|>{\"partial\"",
        ));
        emitted.extend(rewriter.feed(&finish_payload("stop")));

        let chunks = decode_all(&emitted);
        assert_eq!(chunks.len(), 3);
        let header = &chunks[0].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(header.function.name.as_deref(), Some("bash"));
        assert!(chunks[0].choices[0].finish_reason.is_none());

        let args = &chunks[1].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(args.function.arguments.as_deref(), Some("{\"partial\""));
        assert!(chunks[1].choices[0].finish_reason.is_none());

        assert!(chunks[2].choices[0].delta.tool_calls.is_none());
        assert!(chunks[2].choices[0].delta.content.is_none());
        assert_eq!(chunks[2].choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn finish_reason_in_delta_is_promoted_on_passthrough() {
        let mut rewriter = ToolCallRewriter::new();
        let out = rewriter.feed(&finish_payload("stop"));
        let chunks = decode_all(&out);
        assert_eq!(chunks[0].choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(chunks[0].choices[0].delta.finish_reason.is_none());
    }

    #[test]
    fn usage_only_frame_is_verbatim() {
        let mut rewriter = ToolCallRewriter::new();
        let payload = r#"{"id":"chatcmpl-1","choices":[],"usage":{"prompt_tokens":5,"completion_tokens":9}}"#;
        let out = rewriter.feed(payload);
        assert_eq!(out, vec![payload.to_string()]);
    }

    #[test]
    fn unparseable_payload_is_forwarded_opaquely() {
        let mut rewriter = ToolCallRewriter::new();
        let out = rewriter.feed("{not json");
        assert_eq!(out, vec!["{not json".to_string()]);
    }

    #[test]
    fn structured_tool_calls_pass_through() {
        let mut rewriter = ToolCallRewriter::new();
        let payload = r#"{"id":"c","choices":[{"index":0,"delta":{"tool_calls":[{"id":"call_1","type":"function","index":0,"function":{"name":"f","arguments":""}}]}}]}"#;
        let out = rewriter.feed(payload);
        assert_eq!(out, vec![payload.to_string()]);
    }

    #[test]
    fn no_emitted_text_contains_delimiter_bytes() {
        // Once the section opener has been seen the parser buffers everything,
        // so the remainder can be fed one byte at a time, the cruellest
        // partition the safe-flush discipline has to survive.
        let opener = "Pre <|tool_calls_section_begin|>";
        let rest = "<|tool_call_begin|>functions.run:1<|tool_call_argument_begin|>{\"a\":\"<b>\"}<|tool_call_end|><|tool_calls_section_end|> Post";
        let mut rewriter = ToolCallRewriter::new();
        let mut emitted = rewriter.feed(&reasoning_payload(opener));
        for byte in 0..rest.len() {
            emitted.extend(rewriter.feed(&reasoning_payload(&rest[byte..=byte])));
        }
        emitted.extend(rewriter.flush());

        let chunks = decode_all(&emitted);
        let mut content = String::new();
        let mut arguments = String::new();
        for chunk in &chunks {
            let delta = &chunk.choices[0].delta;
            if let Some(text) = &delta.content {
                assert!(!text.contains("<|"), "delimiter bytes in content {text:?}");
                content.push_str(text);
            }
            if let Some(calls) = &delta.tool_calls {
                if let Some(args) = &calls[0].function.arguments {
                    assert!(!args.contains("<|"), "delimiter bytes in args {args:?}");
                    arguments.push_str(args);
                }
            }
        }
        assert_eq!(content, "Pre  Post");
        assert_eq!(arguments, "{\"a\":\"<b>\"}");
    }

    #[test]
    fn chunk_boundary_independence_for_argument_bytes() {
        let stream = "<|tool_calls_section_begin|><|tool_call_begin|>functions.write:1<|tool_call_argument_begin|>{\"path\":\"a<b\",\"data\":\"x < y\"}<|tool_call_end|><|tool_calls_section_end|>";
        let mut whole = ToolCallRewriter::new();
        let whole_out = decode_all(&whole.feed(&reasoning_payload(stream)));

        // Any split that keeps the `<|tool_call` stem of the section opener in
        // one fragment; after that the parser buffers across every boundary.
        for split in [11, 13, 29, 47, 80, stream.len() - 1] {
            let mut split_rewriter = ToolCallRewriter::new();
            let mut emitted = Vec::new();
            emitted.extend(split_rewriter.feed(&reasoning_payload(&stream[..split])));
            emitted.extend(split_rewriter.feed(&reasoning_payload(&stream[split..])));
            emitted.extend(split_rewriter.flush());
            let split_out = decode_all(&emitted);

            let join = |chunks: &[StreamChunk]| -> String {
                chunks
                    .iter()
                    .filter_map(|c| {
                        c.choices[0]
                            .delta
                            .tool_calls
                            .as_ref()
                            .and_then(|calls| calls[0].function.arguments.clone())
                    })
                    .collect()
            };
            // Header arguments are empty strings, so joining covers both.
            assert_eq!(join(&whole_out), join(&split_out), "split at {split}");
        }
    }

    #[test]
    fn held_literal_token_text_is_flushed_at_end_of_stream() {
        let mut rewriter = ToolCallRewriter::new();
        let out = rewriter.feed(&reasoning_payload("mentioning <|tool_call in prose"));
        assert!(out.is_empty(), "ambiguous text must be held back");
        let flushed = decode_all(&rewriter.flush());
        assert_eq!(flushed.len(), 1);
        assert_eq!(content_of(&flushed[0]), Some("mentioning <|tool_call in prose"));
    }

    #[test]
    fn passthrough_never_overtakes_held_text() {
        let mut rewriter = ToolCallRewriter::new();
        assert!(rewriter.feed(&reasoning_payload("held <|tool_call")).is_empty());
        // A later token-free chunk must not jump the queue.
        let out = rewriter.feed(&reasoning_payload(" tail"));
        assert!(out.is_empty());
        let flushed = decode_all(&rewriter.flush());
        assert_eq!(content_of(&flushed[0]), Some("held <|tool_call tail"));
    }

    #[test]
    fn overflowing_buffer_is_flushed_as_content() {
        let mut rewriter = ToolCallRewriter::new();
        let big = format!("<|tool_call {}", "a".repeat(MAX_HELD_BYTES));
        let out = rewriter.feed(&reasoning_payload(&big));
        let chunks = decode_all(&out);
        assert_eq!(chunks.len(), 1);
        assert_eq!(content_of(&chunks[0]), Some(big.as_str()));
        // Parser restarts cleanly afterwards.
        let payload = reasoning_payload("normal");
        assert_eq!(rewriter.feed(&payload), vec![payload.clone()]);
    }

    #[test]
    fn identifier_with_embedded_angle_bracket_does_not_crash() {
        let mut rewriter = ToolCallRewriter::new();
        let mut emitted = rewriter.feed(&reasoning_payload(
            "<|tool_calls_section_begin|><|tool_call_begin|>odd<name:1",
        ));
        emitted.extend(rewriter.feed(&reasoning_payload(
            "<|tool_call_argument_begin|>{}<|tool_call_end|><|tool_calls_section_end|>",
        )));
        let chunks = decode_all(&emitted);
        let header = &chunks[0].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(header.function.name.as_deref(), Some("odd<name"));
    }

    #[test]
    fn reasoning_content_field_is_equivalent() {
        let mut rewriter = ToolCallRewriter::new();
        let payload = serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "delta": {"reasoning_content":
                "<|tool_calls_section_begin|><|tool_call_begin|>t.f:1<|tool_call_argument_begin|>{}<|tool_call_end|><|tool_calls_section_end|>"
            }}]
        })
        .to_string();
        let chunks = decode_all(&rewriter.feed(&payload));
        let header = &chunks[0].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(header.function.name.as_deref(), Some("f"));
    }

    #[test]
    fn text_after_section_end_in_later_chunks_becomes_content() {
        let mut rewriter = ToolCallRewriter::new();
        let mut emitted = rewriter.feed(&reasoning_payload(
            "<|tool_calls_section_begin|><|tool_calls_section_end|>",
        ));
        assert!(emitted.is_empty());
        emitted.extend(rewriter.feed(&reasoning_payload("post-section text")));
        let chunks = decode_all(&emitted);
        assert_eq!(chunks.len(), 1);
        assert_eq!(content_of(&chunks[0]), Some("post-section text"));
    }

    #[test]
    fn whitespace_between_calls_is_consumed() {
        let mut rewriter = ToolCallRewriter::new();
        let mut emitted = Vec::new();
        emitted.extend(rewriter.feed(&reasoning_payload(
            "<|tool_calls_section_begin|><|tool_call_begin|>a:1<|tool_call_argument_begin|>x<|tool_call_end|>\n  ",
        )));
        emitted.extend(rewriter.feed(&reasoning_payload(
            "<|tool_call_begin|>b:2<|tool_call_argument_begin|>y<|tool_call_end|><|tool_calls_section_end|>",
        )));
        let chunks = decode_all(&emitted);
        let names: Vec<_> = chunks
            .iter()
            .filter_map(|c| {
                c.choices[0]
                    .delta
                    .tool_calls
                    .as_ref()
                    .and_then(|calls| calls[0].function.name.clone())
            })
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
