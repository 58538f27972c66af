//! Pure line/column text transforms for collaboration changes.
//!
//! Lines and columns are 0-based; text is split on `\n`. Columns count
//! characters and are clamped to the line length, so out-of-range
//! positions degrade the same way the original string slicing did.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPosition {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRange {
    pub start: EditPosition,
    pub end: EditPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Delete,
    Replace,
}

/// Apply one change to `text` and return the transformed content.
///
/// Replace is delete-then-insert at the collapsed range start, not a single
/// atomic rewrite.
pub fn apply_edit(kind: ChangeKind, text: &str, range: &EditRange, content: &str) -> String {
    match kind {
        ChangeKind::Insert => insert(text, &range.start, content),
        ChangeKind::Delete => delete(text, range),
        ChangeKind::Replace => {
            let removed = delete(text, range);
            insert(&removed, &range.start, content)
        }
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

fn byte_index(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map_or(line.len(), |(index, _)| index)
}

fn insert(text: &str, position: &EditPosition, content: &str) -> String {
    let mut lines = split_lines(text);
    if position.line < lines.len() {
        let line = &lines[position.line];
        let at = byte_index(line, position.column);
        lines[position.line] = format!("{}{}{}", &line[..at], content, &line[at..]);
    } else {
        // line == len appends a new final line; past-the-end clamps to append.
        lines.push(content.to_string());
    }
    lines.join("\n")
}

fn delete(text: &str, range: &EditRange) -> String {
    let mut lines = split_lines(text);
    let last = lines.len() - 1;
    let start_line = range.start.line.min(last);
    let end_line = range.end.line.min(last);

    if start_line >= end_line {
        let line = &lines[start_line];
        let from = byte_index(line, range.start.column);
        let to = byte_index(line, range.end.column).max(from);
        lines[start_line] = format!("{}{}", &line[..from], &line[to..]);
    } else {
        let from = byte_index(&lines[start_line], range.start.column);
        let to = byte_index(&lines[end_line], range.end.column);
        lines[start_line] = format!("{}{}", &lines[start_line][..from], &lines[end_line][to..]);
        lines.drain(start_line + 1..=end_line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize, column: usize) -> EditPosition {
        EditPosition { line, column }
    }

    fn range(start: EditPosition, end: EditPosition) -> EditRange {
        EditRange { start, end }
    }

    #[test]
    fn insert_within_line() {
        let result = apply_edit(
            ChangeKind::Insert,
            "hello world",
            &range(at(0, 5), at(0, 5)),
            ",",
        );
        assert_eq!(result, "hello, world");
    }

    #[test]
    fn insert_at_line_count_appends() {
        let result = apply_edit(
            ChangeKind::Insert,
            "line1\nline2",
            &range(at(2, 0), at(2, 0)),
            "line3",
        );
        assert_eq!(result, "line1\nline2\nline3");
    }

    #[test]
    fn insert_column_past_end_clamps() {
        let result = apply_edit(ChangeKind::Insert, "ab", &range(at(0, 99), at(0, 99)), "c");
        assert_eq!(result, "abc");
    }

    #[test]
    fn delete_within_single_line() {
        let result = apply_edit(
            ChangeKind::Delete,
            "hello, world",
            &range(at(0, 5), at(0, 6)),
            "",
        );
        assert_eq!(result, "hello world");
    }

    #[test]
    fn delete_multi_line_range() {
        let result = apply_edit(
            ChangeKind::Delete,
            "line1\nline2\nline3",
            &range(at(0, 2), at(2, 3)),
            "",
        );
        assert_eq!(result, "lie3");
    }

    #[test]
    fn delete_entire_middle_line() {
        let result = apply_edit(
            ChangeKind::Delete,
            "aaa\nbbb\nccc",
            &range(at(0, 3), at(1, 3)),
            "",
        );
        assert_eq!(result, "aaa\nccc");
    }

    #[test]
    fn replace_is_delete_then_insert_at_start() {
        let result = apply_edit(
            ChangeKind::Replace,
            "hello world",
            &range(at(0, 0), at(0, 5)),
            "goodbye",
        );
        assert_eq!(result, "goodbye world");
    }

    #[test]
    fn replace_across_lines() {
        let result = apply_edit(
            ChangeKind::Replace,
            "one\ntwo\nthree",
            &range(at(0, 0), at(1, 3)),
            "1-2",
        );
        assert_eq!(result, "1-2\nthree");
    }

    #[test]
    fn multibyte_content_is_not_split() {
        let result = apply_edit(ChangeKind::Insert, "héllo", &range(at(0, 2), at(0, 2)), "x");
        assert_eq!(result, "héxllo");
    }
}
