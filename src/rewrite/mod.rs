pub mod chunk;
pub mod emit;
pub mod rewriter;
pub mod tokens;

pub use chunk::{StreamChunk, StreamChoice, StreamDelta, ToolCallDelta, ToolCallFunction};
pub use rewriter::ToolCallRewriter;
