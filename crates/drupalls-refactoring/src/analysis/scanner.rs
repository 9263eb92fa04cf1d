//! String- and comment-aware bracket scanning over source lines
//!
//! This is the structural substitute for a parser: it only knows enough PHP
//! lexing to tell code bytes apart from quoted strings, heredocs and comments,
//! so that a `{` inside `'...'`, `<<<EOT` or `// ...` never moves a brace
//! balance.

use std::ops::ControlFlow;

use crate::types::{Position, TextRange};

/// Lexical state carried from one byte (and one line) to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
    /// Heredoc or nowdoc body, closed by `Lexer::terminator`
    Heredoc,
}

/// Incremental lexer that reports only the bytes that are code
#[derive(Debug, Clone)]
pub struct Lexer {
    state: LexState,
    terminator: String,
}

impl Lexer {
    /// Create a lexer positioned in code
    pub fn new() -> Self {
        Self {
            state: LexState::Code,
            terminator: String::new(),
        }
    }

    /// Whether the lexer is currently inside code
    pub fn in_code(&self) -> bool {
        self.state == LexState::Code
    }

    /// Whether a string literal, heredoc or block comment is still open
    pub fn is_inside_literal(&self) -> bool {
        matches!(
            self.state,
            LexState::SingleQuoted
                | LexState::DoubleQuoted
                | LexState::BlockComment
                | LexState::Heredoc
        )
    }

    /// Scan one line starting at byte `from`, calling `visit` for each code byte
    ///
    /// Line comments end with the line. Strings, heredocs and block comments
    /// carry over to the next call.
    pub fn scan_line<F>(&mut self, line: &str, from: usize, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(usize, u8) -> ControlFlow<()>,
    {
        let bytes = line.as_bytes();
        let mut col = from;

        if self.state == LexState::Heredoc {
            match closing_marker_end(line, &self.terminator) {
                Some(end) => {
                    self.state = LexState::Code;
                    col = col.max(end);
                }
                None => return ControlFlow::Continue(()),
            }
        }

        while col < bytes.len() {
            let byte = bytes[col];
            let next = bytes.get(col + 1).copied();

            match self.state {
                LexState::Code => match byte {
                    b'\'' => self.state = LexState::SingleQuoted,
                    b'"' => self.state = LexState::DoubleQuoted,
                    b'/' if next == Some(b'/') => {
                        self.state = LexState::LineComment;
                        col += 1;
                    }
                    b'/' if next == Some(b'*') => {
                        self.state = LexState::BlockComment;
                        col += 1;
                    }
                    // `#[` opens an attribute, which is code
                    b'#' if next != Some(b'[') => self.state = LexState::LineComment,
                    b'<' if line[col..].starts_with("<<<") => {
                        if let Some(label) = heredoc_label(&line[col + 3..]) {
                            // The body starts on the next line
                            self.terminator = label.to_string();
                            self.state = LexState::Heredoc;
                            return ControlFlow::Continue(());
                        }
                        if visit(col, byte).is_break() {
                            return ControlFlow::Break(());
                        }
                    }
                    _ => {
                        if visit(col, byte).is_break() {
                            return ControlFlow::Break(());
                        }
                    }
                },
                LexState::SingleQuoted | LexState::DoubleQuoted => {
                    let quote = if self.state == LexState::SingleQuoted {
                        b'\''
                    } else {
                        b'"'
                    };
                    if byte == b'\\' {
                        col += 1;
                    } else if byte == quote {
                        self.state = LexState::Code;
                    }
                }
                LexState::BlockComment => {
                    if byte == b'*' && next == Some(b'/') {
                        self.state = LexState::Code;
                        col += 1;
                    }
                }
                LexState::LineComment | LexState::Heredoc => break,
            }

            col += 1;
        }

        if self.state == LexState::LineComment {
            self.state = LexState::Code;
        }

        ControlFlow::Continue(())
    }
}

/// Label of a heredoc or nowdoc opener, given the text after `<<<`
///
/// Accepts `ID`, `"ID"` and `'ID'` followed only by whitespace.
fn heredoc_label(rest: &str) -> Option<&str> {
    let rest = rest.trim_start_matches([' ', '\t']);
    let (quote, rest) = match rest.as_bytes().first() {
        Some(b'\'') => (Some('\''), &rest[1..]),
        Some(b'"') => (Some('"'), &rest[1..]),
        _ => (None, rest),
    };

    let len = identifier_len(rest);
    if len == 0 || rest.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    let (label, mut tail) = rest.split_at(len);
    if let Some(quote) = quote {
        tail = tail.strip_prefix(quote)?;
    }
    tail.trim().is_empty().then_some(label)
}

/// Byte offset just past the closing marker when `line` closes a heredoc
fn closing_marker_end(line: &str, terminator: &str) -> Option<usize> {
    let indent = line.len() - line.trim_start().len();
    let rest = line[indent..].strip_prefix(terminator)?;
    (identifier_len(rest) == 0).then_some(indent + terminator.len())
}

fn identifier_len(text: &str) -> usize {
    text.bytes()
        .take_while(|byte| byte.is_ascii_alphanumeric() || *byte == b'_' || *byte >= 0x80)
        .count()
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a bracket scan did not produce a balanced pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFailure {
    /// The text ended inside a string literal or block comment
    Unterminated,
    /// The opening bracket was never closed, or a stray closer was found first
    Unbalanced,
    /// The stop byte was found before any opening bracket
    Stopped,
}

/// Find the first `open` at or after `from` and its matching `close`
///
/// When `stop` is given and that byte appears in code before any `open`, the
/// scan ends with [`ScanFailure::Stopped`] (e.g. `;` after an abstract
/// method signature).
pub fn find_matching(
    lines: &[&str],
    from: Position,
    open: u8,
    close: u8,
    stop: Option<u8>,
) -> Result<TextRange, ScanFailure> {
    let mut lexer = Lexer::new();
    let mut depth = 0usize;
    let mut opened: Option<Position> = None;
    let mut outcome: Option<Result<TextRange, ScanFailure>> = None;

    for (index, line) in lines.iter().enumerate().skip(from.line) {
        let start = if index == from.line { from.character } else { 0 };

        let flow = lexer.scan_line(line, start, |col, byte| {
            if byte == open {
                if opened.is_none() {
                    opened = Some(Position::new(index, col));
                }
                depth += 1;
            } else if byte == close {
                match opened {
                    Some(open_at) => {
                        depth -= 1;
                        if depth == 0 {
                            outcome = Some(Ok(TextRange::new(open_at, Position::new(index, col))));
                            return ControlFlow::Break(());
                        }
                    }
                    None => {
                        outcome = Some(Err(ScanFailure::Unbalanced));
                        return ControlFlow::Break(());
                    }
                }
            } else if opened.is_none() && Some(byte) == stop {
                outcome = Some(Err(ScanFailure::Stopped));
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });

        if flow.is_break() {
            break;
        }
    }

    match outcome {
        Some(result) => result,
        None if lexer.is_inside_literal() => Err(ScanFailure::Unterminated),
        None => Err(ScanFailure::Unbalanced),
    }
}

/// A comma-separated item between a pair of brackets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Item text with surrounding whitespace trimmed
    pub text: String,
    /// Position of the trimmed text
    pub range: TextRange,
}

/// Items of a bracketed list plus whether the last item is followed by a comma
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItems {
    /// Non-empty items in source order
    pub items: Vec<ListItem>,
    /// Whether a comma follows the last item
    pub trailing_comma: bool,
}

/// Split the text strictly between `brackets.start` and `brackets.end` on
/// top-level commas
pub fn split_list(lines: &[&str], brackets: TextRange) -> ListItems {
    let inner_start = Position::new(brackets.start.line, brackets.start.character + 1);
    let mut separators = Vec::new();
    let mut lexer = Lexer::new();
    let mut depth = 0usize;

    for (index, line) in lines
        .iter()
        .enumerate()
        .take(brackets.end.line + 1)
        .skip(inner_start.line)
    {
        let start = if index == inner_start.line {
            inner_start.character
        } else {
            0
        };

        let flow = lexer.scan_line(line, start, |col, byte| {
            let at = Position::new(index, col);
            if at >= brackets.end {
                return ControlFlow::Break(());
            }
            match byte {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => separators.push(at),
                _ => {}
            }
            ControlFlow::Continue(())
        });

        if flow.is_break() {
            break;
        }
    }

    let mut items = Vec::new();
    let mut segment_start = inner_start;
    let mut trailing_comma = false;

    for boundary in separators
        .iter()
        .copied()
        .chain(std::iter::once(brackets.end))
    {
        match trim_span(lines, segment_start, boundary) {
            Some(range) => {
                items.push(ListItem {
                    text: slice(lines, range),
                    range,
                });
                trailing_comma = false;
            }
            None => trailing_comma = boundary == brackets.end && !items.is_empty(),
        }
        segment_start = Position::new(boundary.line, boundary.character + 1);
    }

    ListItems {
        items,
        trailing_comma,
    }
}

/// Text between two positions, joined with `\n` across lines
pub fn slice(lines: &[&str], range: TextRange) -> String {
    let mut text = String::new();

    for index in range.start.line..=range.end.line {
        let Some(line) = lines.get(index) else {
            break;
        };
        let from = if index == range.start.line {
            range.start.character.min(line.len())
        } else {
            0
        };
        let to = if index == range.end.line {
            range.end.character.min(line.len())
        } else {
            line.len()
        };
        if index > range.start.line {
            text.push('\n');
        }
        if from <= to {
            text.push_str(line.get(from..to).unwrap_or_default());
        }
    }

    text
}

/// Narrow `[start, end)` to its first and last non-whitespace bytes
fn trim_span(lines: &[&str], start: Position, end: Position) -> Option<TextRange> {
    let mut first = None;
    let mut last = None;

    for index in start.line..=end.line {
        let Some(line) = lines.get(index) else {
            break;
        };
        let bytes = line.as_bytes();
        let from = if index == start.line { start.character } else { 0 };
        let to = if index == end.line {
            end.character.min(bytes.len())
        } else {
            bytes.len()
        };

        for col in from..to {
            if !bytes[col].is_ascii_whitespace() {
                if first.is_none() {
                    first = Some(Position::new(index, col));
                }
                last = Some(Position::new(index, col + 1));
            }
        }
    }

    Some(TextRange::new(first?, last?))
}

/// Leading whitespace of a line
pub fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_find_matching_simple_body() {
        let source = lines("function a() {\n  return 1;\n}\n");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(
            range,
            Ok(TextRange::new(Position::new(0, 13), Position::new(2, 0)))
        );
    }

    #[test]
    fn test_braces_in_strings_are_ignored() {
        let source = lines("{\n  $a = '}';\n  $b = \"{{\";\n}\nafter();");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(range.map(|r| r.end.line), Ok(3));
    }

    #[test]
    fn test_braces_in_comments_are_ignored() {
        let source = lines("{\n  // }\n  /* } */ # }\n}");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(range.map(|r| r.end.line), Ok(3));
    }

    #[test]
    fn test_escaped_quote_does_not_close_string() {
        let source = lines("{ $a = 'it\\'s }'; }");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(range.map(|r| r.end.character), Ok(18));
    }

    #[test]
    fn test_attribute_is_code() {
        let source = lines("#[Attr] {\n}");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert!(range.is_ok());
    }

    #[test]
    fn test_braces_in_heredoc_and_nowdoc_are_ignored() {
        let source = lines(
            "{\n  $a = <<<EOT\n  }\n  EOT;\n  $b = <<<'SQL'\n{ } }\nSQL;\n  $c = <<<\"HTML\"\n}\n    HTML . '}';\n}\nafter();",
        );
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(range.map(|r| r.end.line), Ok(10));
    }

    #[test]
    fn test_heredoc_marker_must_end_the_label() {
        // `EOTX` is body text, not the closing marker
        let source = lines("{\n  $a = <<<EOT\nEOTX }\nEOT;\n}");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(range.map(|r| r.end.line), Ok(4));
    }

    #[test]
    fn test_unterminated_heredoc_is_reported() {
        let source = lines("{\n  $a = <<<EOT\n}\n");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(range, Err(ScanFailure::Unterminated));
    }

    #[test]
    fn test_unterminated_string_is_reported() {
        let source = lines("{\n  $a = 'never closed;\n}");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(range, Err(ScanFailure::Unterminated));
    }

    #[test]
    fn test_unbalanced_is_reported() {
        let source = lines("{\n  {\n}");
        let range = find_matching(&source, Position::new(0, 0), b'{', b'}', None);
        assert_eq!(range, Err(ScanFailure::Unbalanced));
    }

    #[test]
    fn test_stop_byte_before_open() {
        let source = lines("abstract function a();\n{}");
        let range = find_matching(&source, Position::new(0, 20), b'{', b'}', Some(b';'));
        assert_eq!(range, Err(ScanFailure::Stopped));
    }

    #[test]
    fn test_split_list_single_line() {
        let source = lines("f(private Foo $foo, array $x = [1, 2], $s = 'a,b')");
        let brackets = find_matching(&source, Position::new(0, 0), b'(', b')', None)
            .expect("balanced");
        let list = split_list(&source, brackets);

        let texts: Vec<&str> = list.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["private Foo $foo", "array $x = [1, 2]", "$s = 'a,b'"]);
        assert!(!list.trailing_comma);
    }

    #[test]
    fn test_split_list_multi_line_trailing_comma() {
        let source = lines("f(\n    $a,\n    $b,\n)");
        let brackets = find_matching(&source, Position::new(0, 0), b'(', b')', None)
            .expect("balanced");
        let list = split_list(&source, brackets);

        assert_eq!(list.items.len(), 2);
        assert_eq!(
            list.items[1].range,
            TextRange::new(Position::new(2, 4), Position::new(2, 6))
        );
        assert!(list.trailing_comma);
    }

    #[test]
    fn test_split_list_empty() {
        let source = lines("f( )");
        let brackets = find_matching(&source, Position::new(0, 0), b'(', b')', None)
            .expect("balanced");
        let list = split_list(&source, brackets);

        assert!(list.items.is_empty());
        assert!(!list.trailing_comma);
    }

    #[test]
    fn test_slice_across_lines() {
        let source = lines("abc\ndef\nghi");
        let text = slice(
            &source,
            TextRange::new(Position::new(0, 1), Position::new(2, 2)),
        );
        assert_eq!(text, "bc\ndef\ngh");
    }
}
