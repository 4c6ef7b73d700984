use std::collections::HashMap;
use std::ops::Range;

use anyhow::Context;

use crate::docx::structure::locate_paragraphs;
use crate::docx::xml::{
    extract_text_with, find_attr, parse_events, tokenize, Element, Token, XmlEvent,
    DELETED_TEXT_LEAF, TEXT_LEAF,
};
use crate::ir::Comment;
use crate::progress::Observer;

const RANGE_START: &str = "w:commentRangeStart";
const RANGE_END: &str = "w:commentRangeEnd";
const REFERENCE: &str = "w:commentReference";

/// Leaves that make up paragraph text, matching what the structurer reports.
const VISIBLE_LEAVES: [&str; 2] = [TEXT_LEAF, DELETED_TEXT_LEAF];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentBody {
    pub id: String,
    pub author: String,
    pub date: String,
    pub text: String,
}

/// Reads `word/comments.xml`. Paragraphs of a comment body are joined with `\n`.
pub fn parse_comment_bodies(comments_xml: &str) -> anyhow::Result<Vec<CommentBody>> {
    let events = parse_events(comments_xml.as_bytes()).context("parse comments part")?;
    let mut out = Vec::new();
    let mut current: Option<CommentBody> = None;
    let mut paras: Vec<String> = Vec::new();
    let mut para = String::new();
    let mut in_text = false;
    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } if name == "w:comment" => {
                current = Some(body_from_attrs(&attrs));
                paras.clear();
                para.clear();
            }
            XmlEvent::Empty { name, attrs } if name == "w:comment" => {
                out.push(body_from_attrs(&attrs));
            }
            XmlEvent::End { name } if name == "w:comment" => {
                if let Some(mut body) = current.take() {
                    if !para.is_empty() {
                        paras.push(std::mem::take(&mut para));
                    }
                    body.text = paras.join("\n");
                    out.push(body);
                }
            }
            XmlEvent::Start { name, .. } if name == "w:t" => in_text = true,
            XmlEvent::End { name } if name == "w:t" => in_text = false,
            XmlEvent::End { name } if name == "w:p" => {
                if current.is_some() {
                    paras.push(std::mem::take(&mut para));
                }
            }
            XmlEvent::Empty { name, .. } if current.is_some() => control_append(&mut para, &name),
            XmlEvent::Text { text } if in_text && current.is_some() => para.push_str(&text),
            _ => {}
        }
    }
    Ok(out)
}

fn body_from_attrs(attrs: &[(String, String)]) -> CommentBody {
    CommentBody {
        id: find_attr(attrs, "w:id").unwrap_or_default().to_string(),
        author: find_attr(attrs, "w:author").unwrap_or_default().to_string(),
        date: find_attr(attrs, "w:date").unwrap_or_default().to_string(),
        text: String::new(),
    }
}

fn control_append(buf: &mut String, name: &str) {
    match name {
        "w:tab" | "w:ptab" => buf.push('\t'),
        "w:br" | "w:cr" => buf.push('\n'),
        "w:noBreakHyphen" => buf.push('-'),
        _ => {}
    }
}

/// Where a comment sits in `document.xml`: the byte range between its markers.
#[derive(Clone, Debug)]
struct Anchor {
    id: String,
    /// End of the range-start marker (or start of the reference for point anchors).
    from: usize,
    /// Start of the range-end marker.
    to: usize,
    /// End of the range-end marker.
    after: usize,
}

/// Joins comment bodies with their anchors in `document.xml`. Comments without an anchor
/// keep empty context and paragraph 0; anchors without a body keep empty metadata.
/// Output is ordered by paragraph, unanchored comments last.
pub fn resolve_comments(
    document_xml: &str,
    bodies: &[CommentBody],
    observer: &dyn Observer,
) -> Vec<Comment> {
    let paragraphs = locate_paragraphs(document_xml);
    let anchors = collect_anchors(document_xml, observer);

    let mut by_id: HashMap<&str, &Anchor> = HashMap::new();
    for a in &anchors {
        by_id.entry(a.id.as_str()).or_insert(a);
    }

    let mut out: Vec<Comment> = Vec::new();
    for body in bodies {
        let mut comment = Comment {
            id: body.id.clone(),
            author: body.author.clone(),
            date: body.date.clone(),
            text: body.text.clone(),
            anchored_text: String::new(),
            context_before: String::new(),
            context_after: String::new(),
            paragraph: 0,
        };
        match by_id.remove(body.id.as_str()) {
            Some(anchor) => place(&mut comment, anchor, document_xml, &paragraphs),
            None => {
                observer.anomaly("comment anchor", &format!("no range for comment {}", body.id))
            }
        }
        out.push(comment);
    }
    for anchor in &anchors {
        if !by_id.contains_key(anchor.id.as_str()) {
            continue;
        }
        by_id.remove(anchor.id.as_str());
        observer.anomaly("comment body", &format!("no body for comment {}", anchor.id));
        let mut comment = Comment {
            id: anchor.id.clone(),
            author: String::new(),
            date: String::new(),
            text: String::new(),
            anchored_text: String::new(),
            context_before: String::new(),
            context_after: String::new(),
            paragraph: 0,
        };
        place(&mut comment, anchor, document_xml, &paragraphs);
        out.push(comment);
    }

    out.sort_by_key(|c| (c.paragraph == 0, c.paragraph));
    out
}

fn marker_id<'a>(tok: &'a Token, tag: &str) -> Option<&'a str> {
    if tok.is_empty_tag(tag) || tok.is_open(tag) {
        tok.attr("w:id")
    } else {
        None
    }
}

fn collect_anchors(document_xml: &str, observer: &dyn Observer) -> Vec<Anchor> {
    let tokens = tokenize(document_xml);
    let mut anchors: Vec<Anchor> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        let Some(id) = marker_id(tok, RANGE_START) else {
            continue;
        };
        let end = tokens[i + 1..]
            .iter()
            .find(|t| marker_id(t, RANGE_END) == Some(id));
        match end {
            Some(end) => {
                anchors.push(Anchor {
                    id: id.to_string(),
                    from: tok.span().end,
                    to: end.span().start,
                    after: end.span().end,
                });
                seen.push(id.to_string());
            }
            None => observer.anomaly("comment range", &format!("no end marker for comment {id}")),
        }
    }

    // A reference without any range still pins the comment to a position.
    for tok in &tokens {
        let Some(id) = marker_id(tok, REFERENCE) else {
            continue;
        };
        if seen.iter().any(|s| s == id) {
            continue;
        }
        let span = tok.span();
        anchors.push(Anchor {
            id: id.to_string(),
            from: span.start,
            to: span.start,
            after: span.end,
        });
        seen.push(id.to_string());
    }
    anchors
}

fn place(
    comment: &mut Comment,
    anchor: &Anchor,
    document_xml: &str,
    paragraphs: &[Element<'_>],
) {
    let Some(start_idx) = enclosing_paragraph(paragraphs, anchor.from) else {
        comment.anchored_text = visible_text(slice(document_xml, anchor.from, anchor.to));
        return;
    };
    let end_idx = paragraphs
        .iter()
        .position(|p| p.contains(anchor.to))
        .unwrap_or(start_idx);
    let start_para = &paragraphs[start_idx];
    let end_para = &paragraphs[end_idx];

    comment.paragraph = start_idx + 1;
    comment.anchored_text = text_between(document_xml, paragraphs, anchor.from..anchor.to);
    comment.context_before = visible_text(slice(document_xml, start_para.start, anchor.from));
    comment.context_after = visible_text(slice(document_xml, anchor.after, end_para.end));
}

fn slice(xml: &str, from: usize, to: usize) -> &str {
    if from >= to {
        return "";
    }
    &xml[from..to]
}

/// Paragraph strictly containing `offset`, else the one whose start is closest.
fn enclosing_paragraph(paragraphs: &[Element<'_>], offset: usize) -> Option<usize> {
    if let Some(idx) = paragraphs.iter().position(|p| p.contains(offset)) {
        return Some(idx);
    }
    paragraphs
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| p.start.abs_diff(offset))
        .map(|(idx, _)| idx)
}

/// Text inside `range`, with `\n` wherever the range crosses a paragraph boundary.
fn text_between(document_xml: &str, paragraphs: &[Element<'_>], range: Range<usize>) -> String {
    if range.start >= range.end {
        return String::new();
    }
    let pieces: Vec<String> = paragraphs
        .iter()
        .filter(|p| p.end > range.start && p.start < range.end)
        .map(|p| {
            let from = p.start.max(range.start);
            let to = p.end.min(range.end);
            visible_text(&document_xml[from..to])
        })
        .collect();
    if pieces.is_empty() {
        return visible_text(&document_xml[range]);
    }
    pieces.join("\n")
}

fn visible_text(xml: &str) -> String {
    extract_text_with(xml, &VISIBLE_LEAVES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullObserver;

    const COMMENTS: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:comments xmlns:w="urn:w">"#,
        r#"<w:comment w:id="0" w:author="Ann" w:date="2024-05-01T10:00:00Z" w:initials="A">"#,
        r#"<w:p><w:r><w:t>check this</w:t></w:r></w:p></w:comment>"#,
        r#"<w:comment w:id="1" w:author="Bo"><w:p><w:r><w:t>line one</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>line&#160;two</w:t><w:tab/><w:t>&amp;</w:t></w:r></w:p></w:comment>"#,
        r#"<w:comment w:id="7" w:author="Cy"><w:p><w:r><w:t>orphan</w:t></w:r></w:p></w:comment>"#,
        r#"</w:comments>"#
    );

    const DOCUMENT: &str = concat!(
        "<w:body>",
        "<w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>",
        "<w:p><w:r><w:t>The </w:t></w:r><w:commentRangeStart w:id=\"1\"/>",
        "<w:r><w:t>quick fox</w:t></w:r><w:commentRangeEnd w:id=\"1\"/>",
        "<w:r><w:commentReference w:id=\"1\"/></w:r><w:r><w:t> jumps.</w:t></w:r></w:p>",
        "<w:p><w:r><w:t>Hello </w:t></w:r><w:commentRangeStart w:id=\"0\"/><w:commentRangeEnd w:id=\"0\"/>",
        "<w:r><w:t>world</w:t></w:r></w:p>",
        "</w:body>"
    );

    #[test]
    fn parses_bodies_with_paragraphs_and_controls() {
        let bodies = parse_comment_bodies(COMMENTS).expect("bodies");
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[0].author, "Ann");
        assert_eq!(bodies[0].date, "2024-05-01T10:00:00Z");
        assert_eq!(bodies[0].text, "check this");
        assert_eq!(bodies[1].text, "line one\nline\u{a0}two\t&");
    }

    #[test]
    fn resolves_ranges_points_and_orphans() {
        let bodies = parse_comment_bodies(COMMENTS).expect("bodies");
        let comments = resolve_comments(DOCUMENT, &bodies, &NullObserver);
        assert_eq!(comments.len(), 3);

        let ranged = &comments[0];
        assert_eq!(ranged.id, "1");
        assert_eq!(ranged.paragraph, 2);
        assert_eq!(ranged.anchored_text, "quick fox");
        assert_eq!(ranged.context_before, "The ");
        assert_eq!(ranged.context_after, " jumps.");

        let point = &comments[1];
        assert_eq!(point.id, "0");
        assert_eq!(point.paragraph, 3);
        assert!(point.is_point());
        assert_eq!(point.context_before, "Hello ");
        assert_eq!(point.context_after, "world");

        let orphan = &comments[2];
        assert_eq!(orphan.id, "7");
        assert_eq!(orphan.paragraph, 0);
        assert!(!orphan.is_anchored());
        assert_eq!(orphan.text, "orphan");
    }

    #[test]
    fn range_without_end_falls_back_to_reference() {
        let doc = concat!(
            "<w:p><w:r><w:t>ab</w:t></w:r><w:commentRangeStart w:id=\"3\"/>",
            "<w:r><w:t>cd</w:t></w:r><w:r><w:commentReference w:id=\"3\"/></w:r>",
            "<w:r><w:t>ef</w:t></w:r></w:p>"
        );
        let bodies = vec![CommentBody {
            id: "3".into(),
            author: "Di".into(),
            ..CommentBody::default()
        }];
        let comments = resolve_comments(doc, &bodies, &NullObserver);
        assert_eq!(comments[0].paragraph, 1);
        assert_eq!(comments[0].anchored_text, "");
        assert_eq!(comments[0].context_before, "abcd");
        assert_eq!(comments[0].context_after, "ef");
    }

    #[test]
    fn anchors_across_paragraphs_keep_the_break() {
        let doc = concat!(
            "<w:p><w:r><w:t>one </w:t></w:r><w:commentRangeStart w:id=\"4\"/><w:r><w:t>two</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>three</w:t></w:r><w:commentRangeEnd w:id=\"4\"/><w:r><w:t> four</w:t></w:r></w:p>"
        );
        let bodies = vec![CommentBody {
            id: "4".into(),
            ..CommentBody::default()
        }];
        let comments = resolve_comments(doc, &bodies, &NullObserver);
        assert_eq!(comments[0].paragraph, 1);
        assert_eq!(comments[0].anchored_text, "two\nthree");
        assert_eq!(comments[0].context_before, "one ");
        assert_eq!(comments[0].context_after, " four");
    }

    #[test]
    fn start_between_paragraphs_lands_on_the_nearest_one() {
        let doc = concat!(
            "<w:body><w:p><w:r><w:t>a heading that runs on for a while</w:t></w:r></w:p>",
            "<w:commentRangeStart w:id=\"1\"/>",
            "<w:p><w:r><w:t>sel</w:t></w:r><w:commentRangeEnd w:id=\"1\"/>",
            "<w:r><w:t> tail</w:t></w:r></w:p></w:body>"
        );
        let bodies = vec![CommentBody {
            id: "1".into(),
            ..CommentBody::default()
        }];
        let comments = resolve_comments(doc, &bodies, &NullObserver);
        assert_eq!(comments[0].paragraph, 2);
        assert_eq!(comments[0].anchored_text, "sel");
        assert_eq!(comments[0].context_before, "");
        assert_eq!(comments[0].context_after, " tail");
    }

    #[test]
    fn open_range_without_reference_is_unanchored() {
        let doc = concat!(
            "<w:p><w:r><w:t>ab</w:t></w:r><w:commentRangeStart w:id=\"5\"/>",
            "<w:r><w:t>cd</w:t></w:r></w:p>"
        );
        let bodies = vec![CommentBody {
            id: "5".into(),
            text: "dangling".into(),
            ..CommentBody::default()
        }];
        let comments = resolve_comments(doc, &bodies, &NullObserver);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].paragraph, 0);
        assert!(!comments[0].is_anchored());
        assert_eq!(comments[0].text, "dangling");
    }

    #[test]
    fn range_without_body_is_kept_with_empty_metadata() {
        let doc = "<w:p><w:commentRangeStart w:id=\"9\"/><w:r><w:t>x</w:t></w:r><w:commentRangeEnd w:id=\"9\"/></w:p>";
        let comments = resolve_comments(doc, &[], &NullObserver);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "9");
        assert_eq!(comments[0].author, "");
        assert_eq!(comments[0].anchored_text, "x");
    }
}
