use serde::{Deserialize, Serialize};

use crate::docx::structure::{structure_document, Paragraph, Segment, StructureOptions};
use crate::ir::{ChangeKind, SpanKind, TrackedChange};
use crate::progress::Observer;

pub const HIGHLIGHT_AUTHOR: &str = "(highlight)";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeFilter {
    #[default]
    All,
    Insertions,
    Deletions,
}

impl ChangeFilter {
    pub fn accepts(self, kind: ChangeKind) -> bool {
        match self {
            ChangeFilter::All => true,
            ChangeFilter::Insertions => kind == ChangeKind::Insertion,
            ChangeFilter::Deletions => kind == ChangeKind::Deletion,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractOptions {
    pub filter: ChangeFilter,
    pub structure: StructureOptions,
}

/// Tracked changes of the whole document plus the paragraph text used for context lookups.
pub fn extract_changes(
    document_xml: &str,
    opts: &ExtractOptions,
    observer: &dyn Observer,
) -> (Vec<TrackedChange>, String) {
    let paragraphs = structure_document(document_xml, &opts.structure, observer);
    let changes = changes_from_paragraphs(&paragraphs, opts.filter);
    (changes, full_text(&paragraphs))
}

pub fn full_text(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .map(Paragraph::text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One change per insertion or deletion element, in paragraph order. Context is the rest of
/// the paragraph on each side, neighbouring changes included.
pub fn changes_from_paragraphs(
    paragraphs: &[Paragraph],
    filter: ChangeFilter,
) -> Vec<TrackedChange> {
    let mut out = Vec::new();
    for para in paragraphs {
        let segs = &para.segments;
        for (i, seg) in segs.iter().enumerate() {
            let Some(kind) = change_kind(seg) else {
                continue;
            };
            if !filter.accepts(kind) {
                continue;
            }
            let author = if seg.highlighted {
                HIGHLIGHT_AUTHOR.to_string()
            } else {
                seg.author.clone()
            };
            out.push(TrackedChange {
                kind,
                author,
                date: seg.date.clone(),
                text: seg.text.clone(),
                paragraph: para.number,
                context_before: concat(&segs[..i]),
                context_after: concat(&segs[i + 1..]),
            });
        }
    }
    out
}

fn change_kind(seg: &Segment) -> Option<ChangeKind> {
    match seg.kind {
        SpanKind::Plain => None,
        SpanKind::Inserted => Some(ChangeKind::Insertion),
        SpanKind::Deleted => Some(ChangeKind::Deletion),
    }
}

fn concat(segs: &[Segment]) -> String {
    segs.iter().map(|s| s.text.as_str()).collect()
}
