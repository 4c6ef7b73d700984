use serde::{Deserialize, Serialize};

use crate::ir::{Comment, TrackedChange};
use crate::textutil::{char_len, count_occurrences, head_chars, tail_chars};

pub const ELLIPSIS: &str = "…";
pub const CURSOR: &str = ">|<";
pub const EMPTY_PARAGRAPH: &str = "(empty paragraph)";
pub const UNANCHORED: &str = "(unanchored)";

/// Per-side context lengths, in chars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub min_len: usize,
    pub max_len: usize,
    pub step: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            min_len: 15,
            max_len: 100,
            step: 10,
        }
    }
}

/// Context on both sides of an item, trimmed and marked with `…` where cut short.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Located {
    pub before: String,
    pub after: String,
}

impl Located {
    /// `before[anchor]after`; the anchor is never shortened.
    pub fn bracketed(&self, anchor: &str) -> String {
        format!("{}[{}]{}", self.before, anchor, self.after)
    }

    /// `before>|<after`, or the empty-paragraph marker when there is nothing around the cursor.
    pub fn cursor(&self) -> String {
        if self.before.is_empty() && self.after.is_empty() {
            return EMPTY_PARAGRAPH.to_string();
        }
        format!("{}{}{}", self.before, CURSOR, self.after)
    }
}

/// Grows the window around `anchor` until `before + anchor + after` occurs at most once in
/// `full_text`, growing the shorter side first (before on ties). Gives up at `max_len` per
/// side or when a side runs out of text, keeping whatever it has then. Whitespace is trimmed
/// from the outer edges only; spaces touching the anchor stay, so `before + anchor + after`
/// is still a substring of the paragraph.
pub fn locate(
    before_full: &str,
    anchor: &str,
    after_full: &str,
    full_text: &str,
    window: &ContextWindow,
) -> Located {
    let before_len = char_len(before_full);
    let after_len = char_len(after_full);
    let max = window.max_len;
    let min = window.min_len.min(max);
    let step = window.step.max(1);

    let mut b = min.min(before_len);
    let mut a = min.min(after_len);
    loop {
        let candidate = format!(
            "{}{}{}",
            tail_chars(before_full, b),
            anchor,
            head_chars(after_full, a)
        );
        if count_occurrences(full_text, &candidate) <= 1 {
            break;
        }
        let before_done = b >= before_len || b >= max;
        let after_done = a >= after_len || a >= max;
        if before_done && after_done {
            break;
        }
        if !before_done && (after_done || b <= a) {
            b = (b + step).min(max).min(before_len);
        } else {
            a = (a + step).min(max).min(after_len);
        }
    }

    let mut before = tail_chars(before_full, b).trim_start().to_string();
    if b < before_len {
        before.insert_str(0, ELLIPSIS);
    }
    let mut after = head_chars(after_full, a).trim_end().to_string();
    if a < after_len {
        after.push_str(ELLIPSIS);
    }
    Located { before, after }
}

pub fn find_change_context(
    change: &TrackedChange,
    full_text: &str,
    window: &ContextWindow,
) -> Located {
    locate(
        &change.context_before,
        &change.text,
        &change.context_after,
        full_text,
        window,
    )
}

/// Context line for a comment: `[selection]` between context for ranged comments, the
/// cursor marker for point comments.
pub fn find_comment_context(comment: &Comment, full_text: &str, window: &ContextWindow) -> String {
    if !comment.is_anchored() {
        return UNANCHORED.to_string();
    }
    if comment.is_point() {
        return find_point_context(comment, full_text, window);
    }
    locate(
        &comment.context_before,
        &comment.anchored_text,
        &comment.context_after,
        full_text,
        window,
    )
    .bracketed(&comment.anchored_text)
}

pub fn find_point_context(comment: &Comment, full_text: &str, window: &ContextWindow) -> String {
    locate(
        &comment.context_before,
        "",
        &comment.context_after,
        full_text,
        window,
    )
    .cursor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ChangeKind;

    fn window(min_len: usize, max_len: usize, step: usize) -> ContextWindow {
        ContextWindow {
            min_len,
            max_len,
            step,
        }
    }

    fn point(before: &str, after: &str) -> Comment {
        Comment {
            id: "0".into(),
            author: "Ann".into(),
            date: String::new(),
            text: "note".into(),
            anchored_text: String::new(),
            context_before: before.into(),
            context_after: after.into(),
            paragraph: 1,
        }
    }

    #[test]
    fn unique_change_keeps_minimum_window() {
        let before = "The quick brown fox jumps over ";
        let after = " lazy dog and keeps running far away.";
        let full = format!("{before}the{after}");
        let change = TrackedChange {
            kind: ChangeKind::Insertion,
            author: "A".into(),
            date: String::new(),
            text: "the".into(),
            paragraph: 1,
            context_before: before.into(),
            context_after: after.into(),
        };
        let loc = find_change_context(&change, &full, &ContextWindow::default());
        assert_eq!(loc.before, "…fox jumps over ");
        assert_eq!(loc.after, " lazy dog and k…");
    }

    #[test]
    fn repeated_text_expands_until_unique() {
        let full = "abc X abc\nzzz X abc";
        let loc = locate("abc ", "X", " abc", full, &window(1, 10, 1));
        // " X " occurs twice, "c X " once.
        assert_eq!(loc.before, "…c ");
        assert_eq!(loc.after, "…");
    }

    #[test]
    fn short_sides_are_not_padded() {
        let loc = locate("ab", "X", "", "abX", &ContextWindow::default());
        assert_eq!(loc.before, "ab");
        assert_eq!(loc.after, "");
    }

    #[test]
    fn only_outer_whitespace_is_trimmed() {
        let loc = locate("  one ", "X", " two  ", "  one X two  ", &ContextWindow::default());
        assert_eq!(loc.before, "one ");
        assert_eq!(loc.after, " two");
    }

    #[test]
    fn best_effort_when_never_unique() {
        let full = "aaaa\naaaa";
        let loc = locate("aa", "", "aa", full, &window(1, 2, 1));
        assert_eq!(loc.before, "aa");
        assert_eq!(loc.after, "aa");
    }

    #[test]
    fn point_comment_places_single_cursor() {
        let full = "say hello world now\nsay hello world later";
        let c = point("say hello", " world now");
        let ctx = find_point_context(&c, full, &window(5, 40, 5));
        assert_eq!(ctx.matches(CURSOR).count(), 1);
        assert!(ctx.contains("hello>|< world now"));

        let w = window(5, 40, 5);
        assert_eq!(find_point_context(&point("", "start"), "start", &w), ">|<start");
        assert_eq!(find_point_context(&point("end", ""), "end", &w), "end>|<");
        assert_eq!(
            find_point_context(&point("", ""), "", &ContextWindow::default()),
            EMPTY_PARAGRAPH
        );
    }

    #[test]
    fn selection_is_never_truncated() {
        let selection = "a very long selected passage that exceeds any window";
        let mut c = point("before ", " after");
        c.anchored_text = selection.into();
        let full = format!("before {selection} after");
        let ctx = find_comment_context(&c, &full, &window(2, 3, 1));
        assert_eq!(ctx, format!("…e [{selection}] a…"));
    }

    #[test]
    fn unanchored_comment_has_marker() {
        let mut c = point("", "");
        c.paragraph = 0;
        assert_eq!(find_comment_context(&c, "", &ContextWindow::default()), UNANCHORED);
    }
}
