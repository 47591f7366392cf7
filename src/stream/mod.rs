pub mod adapter;
pub mod sse;

pub use adapter::{rewrite_stream, StreamAdapter};
pub use sse::{event_stream, SseParser};

/// A parsed SSE frame from the upstream.
///
/// Only the fields this proxy consumes are kept: the optional event name and
/// the joined `data` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// True for the terminal OpenAI `[DONE]` frame.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}
