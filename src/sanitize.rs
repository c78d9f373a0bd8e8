//! Removal of model-internal `<think>` markers.
//!
//! Reasoning models (Qwen3, DeepSeek-R1, …) wrap their chain of thought in
//! `<think>…</think>` before the actual answer. None of it belongs in a
//! student's notes. Three rules are applied, in this order, until the text
//! stops changing:
//!
//! 1. A complete `<think>…</think>` block is removed with its contents.
//! 2. An opening marker with no closing counterpart is removed together with
//!    everything after it.
//! 3. A stray closing marker is removed on its own.
//!
//! Iterating to a fixpoint matters: deleting a block can splice two halves
//! of a marker together (`<thi<think></think>nk>`), and a single pass would
//! leave that new marker behind.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<\s*think\s*>.*?<\s*/\s*think\s*>").unwrap());

static RE_UNTERMINATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<\s*think\s*>.*\z").unwrap());

static RE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*/\s*think\s*>").unwrap());

/// Strip every think marker (and enclosed reasoning) from `text`.
///
/// Pure and idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_once(&current);
        // Every rule only deletes, so equal length means nothing matched.
        if next.len() == current.len() {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}

fn strip_once(input: &str) -> String {
    let s = RE_BLOCK.replace_all(input, "");
    let s = RE_UNTERMINATED.replace(&s, "");
    RE_CLOSE.replace_all(&s, "").into_owned()
}
