use once_cell::sync::Lazy;
use regex::Regex;

use crate::docx::structure::Paragraph;
use crate::ir::{Span, SpanKind};

pub const INSERT_OPEN: &str = "{++";
pub const INSERT_CLOSE: &str = "++}";
pub const DELETE_OPEN: &str = "{--";
pub const DELETE_CLOSE: &str = "--}";

static DELETION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{--.*?--\}").expect("deletion markup regex"));
static INSERTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\+\+(.*?)\+\+\}").expect("insertion markup regex"));

/// Accepts every change: deletions vanish with their content, then insertions lose their
/// brackets. Deletions go first so nested markup resolves outside-in.
pub fn apply_markup(text: &str) -> String {
    let without_deletions = DELETION_RE.replace_all(text, "");
    INSERTION_RE
        .replace_all(&without_deletions, "$1")
        .into_owned()
}

pub fn has_markup(text: &str) -> bool {
    [INSERT_OPEN, INSERT_CLOSE, DELETE_OPEN, DELETE_CLOSE]
        .iter()
        .any(|d| text.contains(d))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffOp<'a> {
    Equal(&'a str),
    Insert(&'a str),
    Delete(&'a str),
}

/// Character diff with semantic cleanup, so small scattered edits coalesce into
/// word-sized ones.
pub fn diff_ops<'a>(old: &'a str, new: &'a str) -> Vec<DiffOp<'a>> {
    dissimilar::diff(old, new)
        .into_iter()
        .map(|chunk| match chunk {
            dissimilar::Chunk::Equal(s) => DiffOp::Equal(s),
            dissimilar::Chunk::Insert(s) => DiffOp::Insert(s),
            dissimilar::Chunk::Delete(s) => DiffOp::Delete(s),
        })
        .collect()
}

/// Marks up the edit from `old` to `new`. `apply_markup` of the result gives back `new`
/// whenever neither text itself contains markup delimiters.
pub fn generate_markup(old: &str, new: &str) -> String {
    let mut out = String::with_capacity(new.len() + old.len() / 2);
    for op in diff_ops(old, new) {
        match op {
            DiffOp::Equal(s) => out.push_str(s),
            DiffOp::Insert(s) => push_wrapped(&mut out, INSERT_OPEN, s, INSERT_CLOSE),
            DiffOp::Delete(s) => push_wrapped(&mut out, DELETE_OPEN, s, DELETE_CLOSE),
        }
    }
    out
}

fn push_wrapped(out: &mut String, open: &str, text: &str, close: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(open);
    out.push_str(text);
    out.push_str(close);
}

pub fn render_spans(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span.kind {
            SpanKind::Plain => out.push_str(&span.content),
            SpanKind::Inserted => push_wrapped(&mut out, INSERT_OPEN, &span.content, INSERT_CLOSE),
            SpanKind::Deleted => push_wrapped(&mut out, DELETE_OPEN, &span.content, DELETE_CLOSE),
        }
    }
    out
}

/// Whole document as markup text: one block per non-empty paragraph, blank line between,
/// headings prefixed with `#` marks.
pub fn render_markup(paragraphs: &[Paragraph]) -> String {
    let mut blocks: Vec<String> = Vec::new();
    for para in paragraphs {
        let body = render_spans(&para.spans());
        if body.trim().is_empty() {
            continue;
        }
        match para.heading {
            Some(level) => blocks.push(format!("{} {}", "#".repeat(level), body)),
            None => blocks.push(body),
        }
    }
    let mut out = blocks.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
