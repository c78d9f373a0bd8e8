//! Line-based Markdown reader for document generation.
//!
//! Only the subset that formatted lecture notes actually use is recognised:
//! ATX headings, paragraphs, `-`/`*`/`+` bullets, numbered items, block
//! quotes, fenced code and horizontal rules, with `**bold**`, `*italic*`
//! and `` `code` `` inline. Everything else is kept as plain paragraph text,
//! so unknown syntax degrades to readable prose rather than an error.
//!
//! The only malformed input is a code fence that never closes: guessing
//! where the code ends would silently swallow the rest of the notes.

use crate::error::ArtifactError;
use once_cell::sync::Lazy;
use regex::Regex;

/// A styled span of text inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
}

/// One block-level element, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, runs: Vec<Run> },
    Paragraph { runs: Vec<Run> },
    Bullet { runs: Vec<Run> },
    Numbered { number: u32, runs: Vec<Run> },
    Quote { runs: Vec<Run> },
    Code { lines: Vec<String> },
    Rule,
}

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(#{1,6})(?:\s+(.*?))?(?:\s+#+)?\s*$").unwrap());

static RE_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").unwrap());

static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+]\s+(.*)$").unwrap());

static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,9})[.)]\s+(.*)$").unwrap());

static RE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}>\s?(.*)$").unwrap());

/// Parse `markdown` into blocks.
///
/// # Errors
/// * [`ArtifactError::MalformedMarkdown`]: a code fence is never closed
/// * [`ArtifactError::EmptyDocument`]: nothing but whitespace
pub fn parse(markdown: &str) -> Result<Vec<Block>, ArtifactError> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut lines = markdown.lines().enumerate();

    while let Some((idx, line)) = lines.next() {
        let trimmed = line.trim_start();

        if let Some(fence) = fence_marker(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut code = Vec::new();
            let mut closed = false;
            for (_, code_line) in lines.by_ref() {
                if is_closing_fence(code_line, fence) {
                    closed = true;
                    break;
                }
                code.push(code_line.to_string());
            }
            if !closed {
                return Err(ArtifactError::MalformedMarkdown {
                    line: idx + 1,
                    reason: "code fence is never closed".into(),
                });
            }
            blocks.push(Block::Code { lines: code });
            continue;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            continue;
        }

        if let Some(caps) = RE_HEADING.captures(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let text = caps.get(2).map_or("", |m| m.as_str());
            if !text.is_empty() {
                blocks.push(Block::Heading {
                    level: caps[1].len() as u8,
                    runs: parse_inline(text),
                });
            }
            continue;
        }

        if RE_RULE.is_match(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Rule);
            continue;
        }

        if let Some(caps) = RE_BULLET.captures(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Bullet {
                runs: parse_inline(caps[1].trim()),
            });
            continue;
        }

        if let Some(caps) = RE_NUMBERED.captures(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Numbered {
                number: caps[1].parse().unwrap_or(1),
                runs: parse_inline(caps[2].trim()),
            });
            continue;
        }

        if let Some(caps) = RE_QUOTE.captures(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let text = caps[1].trim();
            if !text.is_empty() {
                blocks.push(Block::Quote {
                    runs: parse_inline(text),
                });
            }
            continue;
        }

        paragraph.push(line.trim());
    }
    flush_paragraph(&mut paragraph, &mut blocks);

    if blocks.is_empty() {
        return Err(ArtifactError::EmptyDocument);
    }
    Ok(blocks)
}

fn fence_marker(trimmed: &str) -> Option<char> {
    if trimmed.starts_with("```") {
        Some('`')
    } else if trimmed.starts_with("~~~") {
        Some('~')
    } else {
        None
    }
}

fn is_closing_fence(line: &str, fence: char) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == fence)
}

/// Soft line breaks inside a paragraph become spaces.
fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join(" ");
    lines.clear();
    blocks.push(Block::Paragraph {
        runs: parse_inline(&text),
    });
}

// ── Inline ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Style {
    bold: bool,
    italic: bool,
}

/// Longest delimiters first so `***` is not read as `**` + `*`.
const DELIMITERS: [(&str, bool, bool); 5] = [
    ("***", true, true),
    ("**", true, false),
    ("__", true, false),
    ("*", false, true),
    ("_", false, true),
];

/// Split inline text into styled runs. Unbalanced markers stay literal.
pub fn parse_inline(text: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    push_inline(text, Style::default(), &mut runs);

    // Merge neighbours with identical styling.
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(last)
                if last.bold == run.bold && last.italic == run.italic && last.code == run.code =>
            {
                last.text.push_str(&run.text)
            }
            _ => merged.push(run),
        }
    }
    merged
}

fn push_inline(text: &str, style: Style, out: &mut Vec<Run>) {
    let mut plain = String::new();
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];

        // Backslash escapes of ASCII punctuation.
        if let Some(escaped) = rest.strip_prefix('\\') {
            if let Some(c) = escaped.chars().next().filter(char::is_ascii_punctuation) {
                plain.push(c);
                i += 1 + c.len_utf8();
                continue;
            }
        }

        if let Some(body) = rest.strip_prefix('`') {
            if let Some(end) = body.find('`').filter(|&end| end > 0) {
                flush_plain(&mut plain, style, out);
                out.push(Run {
                    text: body[..end].to_string(),
                    bold: style.bold,
                    italic: style.italic,
                    code: true,
                });
                i += end + 2;
                continue;
            }
        }

        if let Some((delim_len, inner, inner_style)) = emphasis_at(text, i, style) {
            flush_plain(&mut plain, style, out);
            push_inline(inner, inner_style, out);
            i += delim_len * 2 + inner.len();
            continue;
        }

        match rest.chars().next() {
            Some(c) => {
                plain.push(c);
                i += c.len_utf8();
            }
            None => break,
        }
    }
    flush_plain(&mut plain, style, out);
}

/// If an emphasis span opens at byte `i`, return its delimiter length, its
/// inner text and the style to apply inside.
fn emphasis_at(text: &str, i: usize, style: Style) -> Option<(usize, &str, Style)> {
    let rest = &text[i..];
    for (delim, bold, italic) in DELIMITERS {
        if !rest.starts_with(delim) {
            continue;
        }
        // `snake_case_names` are not emphasis.
        if delim.starts_with('_') && text[..i].chars().next_back().is_some_and(char::is_alphanumeric) {
            return None;
        }
        let body = &rest[delim.len()..];
        if body.starts_with(char::is_whitespace) {
            continue;
        }
        let Some(end) = body.find(delim).filter(|&end| end > 0) else {
            continue;
        };
        let inner = &body[..end];
        if inner.ends_with(char::is_whitespace) {
            continue;
        }
        return Some((
            delim.len(),
            inner,
            Style {
                bold: style.bold || bold,
                italic: style.italic || italic,
            },
        ));
    }
    None
}

fn flush_plain(plain: &mut String, style: Style, out: &mut Vec<Run>) {
    if plain.is_empty() {
        return;
    }
    out.push(Run {
        text: std::mem::take(plain),
        bold: style.bold,
        italic: style.italic,
        code: false,
    });
}
