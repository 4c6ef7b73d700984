use crate::docx::xml::{
    collect_leaf_text, find_elements, tokenize, Element, Token, DELETED_TEXT_LEAF, TEXT_LEAF,
};
use crate::ir::{Span, SpanKind};
use crate::progress::Observer;

pub const PARAGRAPH_TAG: &str = "w:p";
pub const RUN_TAG: &str = "w:r";
pub const INSERTION_TAG: &str = "w:ins";
pub const DELETION_TAG: &str = "w:del";

#[derive(Clone, Copy, Debug, Default)]
pub struct StructureOptions {
    /// Treat highlighted plain runs as insertions.
    pub highlights_as_insertions: bool,
}

/// One element's worth of paragraph text, before adjacent spans are merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub kind: SpanKind,
    pub text: String,
    pub author: String,
    pub date: String,
    /// Plain run reclassified as an insertion because of its highlight.
    pub highlighted: bool,
}

impl Segment {
    fn plain(text: String) -> Self {
        Self {
            kind: SpanKind::Plain,
            text,
            author: String::new(),
            date: String::new(),
            highlighted: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Paragraph {
    /// 1-indexed.
    pub number: usize,
    pub start: usize,
    pub end: usize,
    pub heading: Option<usize>,
    pub segments: Vec<Segment>,
}

impl Paragraph {
    pub fn spans(&self) -> Vec<Span> {
        merge_spans(&self.segments)
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Open-minus-close counts for the two change wrappers. A plain run is only taken
/// when both are zero.
#[derive(Default)]
struct WrapperDepth {
    ins: usize,
    del: usize,
}

impl WrapperDepth {
    fn enter(&mut self, tag: &str) {
        match tag {
            INSERTION_TAG => self.ins += 1,
            DELETION_TAG => self.del += 1,
            _ => {}
        }
    }

    fn leave(&mut self, tag: &str) {
        match tag {
            INSERTION_TAG => self.ins = self.ins.saturating_sub(1),
            DELETION_TAG => self.del = self.del.saturating_sub(1),
            _ => {}
        }
    }

    fn outside(&self) -> bool {
        self.ins == 0 && self.del == 0
    }
}

pub fn locate_paragraphs(document_xml: &str) -> Vec<Element<'_>> {
    find_elements(document_xml, PARAGRAPH_TAG)
}

pub fn structure_document(
    document_xml: &str,
    opts: &StructureOptions,
    observer: &dyn Observer,
) -> Vec<Paragraph> {
    locate_paragraphs(document_xml)
        .into_iter()
        .enumerate()
        .map(|(idx, el)| Paragraph {
            number: idx + 1,
            start: el.start,
            end: el.end,
            heading: heading_level(el.inner),
            segments: structure_paragraph(el.inner, opts, observer),
        })
        .collect()
}

/// Walks a paragraph's content in document order and returns one segment per plain run,
/// insertion or deletion element. Elements without text produce nothing; an element that
/// is never closed is skipped one token at a time.
pub fn structure_paragraph(
    inner: &str,
    opts: &StructureOptions,
    observer: &dyn Observer,
) -> Vec<Segment> {
    let tokens = tokenize(inner);
    let mut out: Vec<Segment> = Vec::new();
    let mut depth = WrapperDepth::default();
    let mut i = 0usize;
    while i < tokens.len() {
        let tok = &tokens[i];
        let wrapper = if tok.is_open(INSERTION_TAG) {
            Some(INSERTION_TAG)
        } else if tok.is_open(DELETION_TAG) {
            Some(DELETION_TAG)
        } else {
            None
        };
        if let Some(tag) = wrapper {
            match matching_close(&tokens, i, tag) {
                Some(j) => {
                    let body = &tokens[i + 1..j];
                    let (kind, text) = if tag == INSERTION_TAG {
                        (SpanKind::Inserted, collect_leaf_text(inner, body, &[TEXT_LEAF]))
                    } else {
                        (SpanKind::Deleted, deleted_text(inner, body))
                    };
                    if !text.is_empty() {
                        out.push(Segment {
                            kind,
                            text,
                            author: tok.attr("w:author").unwrap_or_default().to_string(),
                            date: tok.attr("w:date").unwrap_or_default().to_string(),
                            highlighted: false,
                        });
                    }
                    i = j + 1;
                }
                None => {
                    observer.anomaly(
                        &format!("unclosed <{tag}>"),
                        &format!("byte {} of paragraph", tok.span().start),
                    );
                    depth.enter(tag);
                    i += 1;
                }
            }
            continue;
        }
        if tok.is_close(INSERTION_TAG) || tok.is_close(DELETION_TAG) {
            if let Token::Close { name, .. } = tok {
                depth.leave(name);
            }
            i += 1;
            continue;
        }
        if tok.is_open(RUN_TAG) && depth.outside() {
            match matching_close(&tokens, i, RUN_TAG) {
                Some(j) => {
                    let body = &tokens[i + 1..j];
                    let text = collect_leaf_text(inner, body, &[TEXT_LEAF]);
                    if !text.is_empty() {
                        let mut seg = Segment::plain(text);
                        if opts.highlights_as_insertions && is_highlighted(body) {
                            seg.kind = SpanKind::Inserted;
                            seg.highlighted = true;
                        }
                        out.push(seg);
                    }
                    i = j + 1;
                }
                None => {
                    observer.anomaly(
                        "unclosed <w:r>",
                        &format!("byte {} of paragraph", tok.span().start),
                    );
                    i += 1;
                }
            }
            continue;
        }
        i += 1;
    }
    out
}

/// Deleted content is normally stored in `w:delText`; some producers keep plain `w:t`.
fn deleted_text(xml: &str, body: &[Token]) -> String {
    let primary = collect_leaf_text(xml, body, &[DELETED_TEXT_LEAF]);
    if !primary.is_empty() {
        return primary;
    }
    collect_leaf_text(xml, body, &[TEXT_LEAF])
}

fn matching_close(tokens: &[Token], open_idx: usize, tag: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (j, tok) in tokens.iter().enumerate().skip(open_idx + 1) {
        if tok.is_open(tag) {
            depth += 1;
        } else if tok.is_close(tag) {
            if depth == 0 {
                return Some(j);
            }
            depth -= 1;
        }
    }
    None
}

fn is_highlighted(run_body: &[Token]) -> bool {
    run_body.iter().any(|t| {
        (t.is_empty_tag("w:highlight") || t.is_open("w:highlight"))
            && t.attr("w:val").is_some_and(|v| v != "none")
    })
}

/// Merges neighbouring inserted (or deleted) segments; plain segments stay as they are.
pub fn merge_spans(segments: &[Segment]) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::new();
    for seg in segments {
        if let Some(last) = out.last_mut() {
            if seg.kind != SpanKind::Plain && last.kind == seg.kind {
                last.content.push_str(&seg.text);
                continue;
            }
        }
        out.push(Span::new(seg.kind, seg.text.clone()));
    }
    out
}

/// Paragraph text as the context finder sees it: every span, deleted ones included.
pub fn paragraph_text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.content.as_str()).collect()
}

pub fn heading_level(paragraph_inner: &str) -> Option<usize> {
    let ppr_end = paragraph_inner.find("</w:pPr>")?;
    let tokens = tokenize(&paragraph_inner[..ppr_end]);
    if let Some(lvl) = tokens
        .iter()
        .find(|t| t.is_empty_tag("w:outlineLvl"))
        .and_then(|t| t.attr("w:val"))
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        // Level 9 means body text.
        if lvl < 9 {
            return Some((lvl + 1).min(6));
        }
    }
    let style = tokens
        .iter()
        .find(|t| t.is_empty_tag("w:pStyle"))
        .and_then(|t| t.attr("w:val"))?
        .trim();
    let lower = style.to_ascii_lowercase();
    if lower.starts_with("heading") {
        let digits: String = style.chars().skip_while(|c| !c.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse::<usize>() {
            if n > 0 {
                return Some(n.min(6));
            }
        }
    }
    if lower == "title" {
        return Some(1);
    }
    None
}
