use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::context::{find_change_context, find_comment_context, ContextWindow};
use crate::ir::{Comment, DiffOutput, TrackedChange};
use crate::textutil::single_line;

pub const GIT_HEADER: &str = "\
# Tracked changes and comments shown as a word diff.
# '+' lines are insertions, '-' lines are deletions, '>' lines are comments.
# The quoted text after '#' locates each item: [brackets] hold the changed or
# selected text, >|< marks where a comment without a selection is attached.
";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Git,
    Json,
}

pub fn render(
    output: &DiffOutput,
    format: OutputFormat,
    window: &ContextWindow,
    placeholder: &str,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Git => Ok(format_git(output, window, placeholder)),
        OutputFormat::Json => format_json(output, window),
    }
}

#[derive(Default)]
struct Group<'a> {
    changes: Vec<&'a TrackedChange>,
    comments: Vec<&'a Comment>,
}

/// Diff-like report: one `@@ paragraph N @@` block per touched paragraph, ascending, changes
/// before comments; unanchored comments close the report. Every item stays on one line.
pub fn format_git(output: &DiffOutput, window: &ContextWindow, placeholder: &str) -> String {
    let name = output.filename.as_str();
    let mut groups: BTreeMap<usize, Group<'_>> = BTreeMap::new();
    let mut unanchored: Vec<&Comment> = Vec::new();
    for change in &output.changes {
        groups.entry(change.paragraph).or_default().changes.push(change);
    }
    for comment in &output.comments {
        if comment.is_anchored() {
            groups.entry(comment.paragraph).or_default().comments.push(comment);
        } else {
            unanchored.push(comment);
        }
    }

    let mut out = String::from(GIT_HEADER);
    let _ = writeln!(out, "diff --word a/{name} b/{name}");
    let _ = writeln!(out, "--- a/{name}");
    let _ = writeln!(out, "+++ b/{name}");
    for (paragraph, group) in &groups {
        let _ = writeln!(out, "@@ paragraph {paragraph} @@");
        for change in &group.changes {
            out.push_str(&change_line(change, &output.full_text, window, placeholder));
        }
        for comment in &group.comments {
            out.push_str(&comment_line(comment, &output.full_text, window, placeholder));
        }
    }
    if !unanchored.is_empty() {
        out.push_str("@@ unanchored @@\n");
        for comment in unanchored {
            out.push_str(&comment_line(comment, &output.full_text, window, placeholder));
        }
    }
    out
}

fn change_line(
    change: &TrackedChange,
    full_text: &str,
    window: &ContextWindow,
    placeholder: &str,
) -> String {
    let context = find_change_context(change, full_text, window).bracketed(&change.text);
    format!(
        "{}{}  # \"{}\"\n",
        change.kind.sign(),
        single_line(&change.text, placeholder),
        single_line(&context, placeholder)
    )
}

fn comment_line(
    comment: &Comment,
    full_text: &str,
    window: &ContextWindow,
    placeholder: &str,
) -> String {
    let context = find_comment_context(comment, full_text, window);
    let author = if comment.author.is_empty() {
        "unknown"
    } else {
        comment.author.as_str()
    };
    format!(
        "> [{}]: {}  # \"{}\"\n",
        single_line(author, placeholder),
        single_line(&comment.text, placeholder),
        single_line(&context, placeholder)
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    filename: &'a str,
    changes: Vec<JsonChange<'a>>,
    comments: Vec<JsonComment<'a>>,
    full_text: &'a str,
}

#[derive(Serialize)]
struct JsonChange<'a> {
    #[serde(flatten)]
    change: &'a TrackedChange,
    context: String,
}

#[derive(Serialize)]
struct JsonComment<'a> {
    #[serde(flatten)]
    comment: &'a Comment,
    context: String,
}

/// The `DiffOutput` fields plus the located context of every item.
pub fn format_json(output: &DiffOutput, window: &ContextWindow) -> anyhow::Result<String> {
    let report = JsonReport {
        filename: &output.filename,
        changes: output
            .changes
            .iter()
            .map(|change| JsonChange {
                change,
                context: find_change_context(change, &output.full_text, window)
                    .bracketed(&change.text),
            })
            .collect(),
        comments: output
            .comments
            .iter()
            .map(|comment| JsonComment {
                comment,
                context: find_comment_context(comment, &output.full_text, window),
            })
            .collect(),
        full_text: &output.full_text,
    };
    let mut json = serde_json::to_string_pretty(&report).context("serialize report json")?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ChangeKind;
    use crate::textutil::NEWLINE_PLACEHOLDER;

    fn sample() -> DiffOutput {
        DiffOutput {
            filename: "memo.docx".into(),
            changes: vec![
                TrackedChange {
                    kind: ChangeKind::Deletion,
                    author: "Bo".into(),
                    date: String::new(),
                    text: "bar".into(),
                    paragraph: 2,
                    context_before: "Second ".into(),
                    context_after: " here.".into(),
                },
                TrackedChange {
                    kind: ChangeKind::Insertion,
                    author: "Ann".into(),
                    date: String::new(),
                    text: "foo".into(),
                    paragraph: 1,
                    context_before: "First ".into(),
                    context_after: String::new(),
                },
            ],
            comments: vec![
                Comment {
                    id: "5".into(),
                    author: String::new(),
                    date: String::new(),
                    text: "lost\nnote".into(),
                    anchored_text: String::new(),
                    context_before: String::new(),
                    context_after: String::new(),
                    paragraph: 0,
                },
                Comment {
                    id: "1".into(),
                    author: "Cy".into(),
                    date: String::new(),
                    text: "why?".into(),
                    anchored_text: "Second".into(),
                    context_before: String::new(),
                    context_after: " bar here.".into(),
                    paragraph: 2,
                },
            ],
            full_text: "First foo\nSecond bar here.".into(),
        }
    }

    #[test]
    fn git_groups_by_paragraph_changes_first() {
        let text = format_git(&sample(), &ContextWindow::default(), NEWLINE_PLACEHOLDER);
        let body: Vec<&str> = text.lines().skip_while(|l| l.starts_with('#')).collect();
        assert_eq!(
            body,
            vec![
                "diff --word a/memo.docx b/memo.docx",
                "--- a/memo.docx",
                "+++ b/memo.docx",
                "@@ paragraph 1 @@",
                "+foo  # \"First [foo]\"",
                "@@ paragraph 2 @@",
                "-bar  # \"Second [bar] here.\"",
                "> [Cy]: why?  # \"[Second] bar here.\"",
                "@@ unanchored @@",
                "> [unknown]: lost↵note  # \"(unanchored)\"",
            ]
        );
    }

    #[test]
    fn json_carries_fields_and_context() {
        let json = format_json(&sample(), &ContextWindow::default()).expect("json");
        let v: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(v["filename"], "memo.docx");
        assert_eq!(v["changes"][0]["kind"], "deletion");
        assert_eq!(v["changes"][0]["paragraph"], 2);
        assert_eq!(v["changes"][0]["context"], "Second [bar] here.");
        assert_eq!(v["comments"][1]["anchored_text"], "Second");
        assert_eq!(v["full_text"], "First foo\nSecond bar here.");
    }
}
