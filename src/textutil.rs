pub const NEWLINE_PLACEHOLDER: &str = "↵";

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First `n` chars of `text` (whole string when shorter).
pub fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `n` chars of `text` (whole string when shorter).
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return &text[text.len()..];
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Counts matches of `needle`, letting matches overlap: after each hit the search
/// resumes one char past the hit's start. An empty needle never matches.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0usize;
    let mut from = 0usize;
    while let Some(pos) = haystack[from..].find(needle) {
        count += 1;
        let hit = from + pos;
        let step = haystack[hit..].chars().next().map(char::len_utf8).unwrap_or(1);
        from = hit + step;
        if from >= haystack.len() {
            break;
        }
    }
    count
}

/// Collapses every line break into `placeholder` so the text fits on one output line.
pub fn single_line(text: &str, placeholder: &str) -> String {
    text.replace("\r\n", placeholder)
        .replace(['\n', '\r'], placeholder)
}
