use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Plain,
    Inserted,
    Deleted,
}

/// A contiguous run of paragraph text tagged with its editorial status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub content: String,
}

impl Span {
    pub fn new(kind: SpanKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insertion,
    Deletion,
}

impl ChangeKind {
    pub fn sign(self) -> char {
        match self {
            ChangeKind::Insertion => '+',
            ChangeKind::Deletion => '-',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedChange {
    pub kind: ChangeKind,
    pub author: String,
    pub date: String,
    pub text: String,
    /// 1-indexed position in the document's paragraph sequence.
    pub paragraph: usize,
    pub context_before: String,
    pub context_after: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub date: String,
    pub text: String,
    /// Empty for point comments and for unanchored comments.
    pub anchored_text: String,
    pub context_before: String,
    pub context_after: String,
    /// 0 when the comment body has no anchor in the document.
    pub paragraph: usize,
}

impl Comment {
    pub fn is_point(&self) -> bool {
        self.anchored_text.is_empty()
    }

    pub fn is_anchored(&self) -> bool {
        self.paragraph > 0
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiffOutput {
    pub filename: String,
    pub changes: Vec<TrackedChange>,
    pub comments: Vec<Comment>,
    /// Paragraph texts joined by `\n`; the haystack for context uniqueness.
    pub full_text: String,
}
