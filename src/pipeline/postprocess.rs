//! Post-processing: deterministic cleanup of LLM-formatted Markdown.
//!
//! Even well-prompted models wrap their answer in ` ```markdown ` fences,
//! emit Windows line endings, or sprinkle zero-width characters copied from
//! the OCR text. These rules fix such quirks without touching content.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw answer; invisible characters go last so none of the earlier
//! rules has to care about them. The think-marker sanitiser runs *after*
//! all of this (see [`crate::pipeline::format`]), because removing an
//! invisible character can join the halves of a marker.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw model output.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
pub fn clean_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    remove_invisible_chars(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_answer_is_unwrapped() {
        let input = "```markdown\n# Lecture 3\n- stacks\n```";
        assert_eq!(strip_markdown_fences(input), "# Lecture 3\n- stacks");
        let bare = "```\n# Lecture 3\n```\n";
        assert_eq!(strip_markdown_fences(bare), "# Lecture 3");
    }

    #[test]
    fn code_example_inside_notes_survives() {
        let input = "# Recursion\n\n```python\ndef f(n):\n    return n\n```";
        assert_eq!(clean_markdown(input), input);
    }

    #[test]
    fn windows_and_old_mac_endings_become_lf() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn trailing_spaces_go_but_indentation_stays() {
        assert_eq!(
            trim_trailing_whitespace("    indented   \n- item \t"),
            "    indented\n- item"
        );
    }

    #[test]
    fn long_gaps_shrink_to_two_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn zero_width_characters_are_dropped() {
        let input = "Big\u{200B}-O\u{FEFF} nota\u{00AD}tion";
        assert_eq!(remove_invisible_chars(input), "Big-O notation");
    }

    #[test]
    fn clean_notes_pass_through_unchanged() {
        let input = "# Title\n\nSome **bold** text.";
        assert_eq!(clean_markdown(input), input);
    }

    #[test]
    fn all_rules_together() {
        let input = "```markdown\n# Week 2\r\n\r\nGraphs   \n\n\n\n\n\n## BFS\u{200B}\n```";
        assert_eq!(clean_markdown(input), "# Week 2\n\nGraphs\n\n\n## BFS");
    }
}
