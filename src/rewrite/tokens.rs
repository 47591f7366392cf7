/// Delimiter alphabet of the upstream tool-call sub-language.
///
/// The upstream model embeds tool calls inside its reasoning stream as a
/// token-delimited section:
///
/// ```text
/// <|tool_calls_section_begin|>
/// <|tool_call_begin|>functions.bash:1<|tool_call_argument_begin|>{"cmd":"ls"}<|tool_call_end|>
/// <|tool_calls_section_end|>
/// ```
///
/// All delimiters are case-sensitive, byte-exact, start with `<`, and contain
/// no `<` in any other position. That property is what makes the `<`-based
/// hold-back in the rewriter sound.
use std::time::{SystemTime, UNIX_EPOCH};

use memchr::{memmem, memrchr};

pub const SECTION_BEGIN: &str = "<|tool_calls_section_begin|>";
pub const CALL_BEGIN: &str = "<|tool_call_begin|>";
pub const ARGUMENT_BEGIN: &str = "<|tool_call_argument_begin|>";
pub const CALL_END: &str = "<|tool_call_end|>";
pub const SECTION_END: &str = "<|tool_calls_section_end|>";

/// Shared stem of every delimiter that can open a call or a section.
const CALL_TOKEN_STEM: &[u8] = b"<|tool_call";

/// True when `text` contains the delimiter stem anywhere.
///
/// Used by the fast passthrough path: a chunk whose reasoning never mentions
/// the stem cannot need rewriting while the parser is idle.
#[inline]
#[must_use]
pub fn contains_call_token(text: &str) -> bool {
    memmem::find(text.as_bytes(), CALL_TOKEN_STEM).is_some()
}

/// Position of the last byte in `text` that could still become a delimiter
/// if more input arrived.
///
/// Every delimiter begins with `<`, so only a trailing span starting at the
/// last `<` is ambiguous; everything before it is settled text.
#[inline]
#[must_use]
pub fn last_possible_token_start(text: &str) -> Option<usize> {
    memrchr(b'<', text.as_bytes())
}

/// Resolve the downstream tool-call id for a raw identifier token.
///
/// Identifiers already in the `call_*` convention are used verbatim so
/// cross-request correlation survives the rewrite. Anything else gets a
/// synthesized `call_<index>_<millis>` id; the raw token is still parsed
/// for the display name by [`function_name`].
#[must_use]
pub fn tool_call_id(raw: &str, index: u32) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("call_") {
        return trimmed.to_string();
    }
    format!("call_{index}_{}", unix_now_millis())
}

/// Extract the function display name from a raw identifier token.
///
/// Takes the substring after the first `.`, then the substring before the
/// last `:`. `functions.bash:15` → `bash`, `my.pkg.task:3` → `pkg.task`,
/// `do_it` → `do_it`.
#[must_use]
pub fn function_name(raw: &str) -> &str {
    let mut name = raw.trim();
    if let Some(dot) = name.find('.') {
        name = &name[dot + 1..];
    }
    if let Some(colon) = name.rfind(':') {
        name = &name[..colon];
    }
    name
}

#[inline]
fn unix_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis() as u64)
}
