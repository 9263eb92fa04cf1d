//! Applying computed edits to text

use crate::error::{InjectionError, Result};
use crate::types::{Position, RefactoringEdit};

/// Byte offsets of line starts
struct LineIndex<'t> {
    text: &'t str,
    starts: Vec<usize>,
}

impl<'t> LineIndex<'t> {
    fn new(text: &'t str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(offset, _)| offset + 1),
        );
        Self { text, starts }
    }

    /// Length of a line's content, line terminator excluded
    fn line_len(&self, line: usize) -> usize {
        let start = self.starts[line];
        let content = match self.starts.get(line + 1) {
            Some(next) => &self.text[start..next - 1],
            None => &self.text[start..],
        };
        content.strip_suffix('\r').unwrap_or(content).len()
    }

    fn offset(&self, position: Position) -> Result<usize> {
        if position.line == self.starts.len() && position.character == 0 {
            // One past the last line
            return Ok(self.text.len());
        }
        if position.line >= self.starts.len() {
            return Err(InjectionError::InvalidEdit(format!(
                "Line {} out of bounds (total lines: {})",
                position.line,
                self.starts.len()
            )));
        }

        let line_len = self.line_len(position.line);
        if position.character > line_len {
            return Err(InjectionError::InvalidEdit(format!(
                "Character {} out of bounds (line {} length: {})",
                position.character, position.line, line_len
            )));
        }

        let offset = self.starts[position.line] + position.character;
        if !self.text.is_char_boundary(offset) {
            return Err(InjectionError::InvalidEdit(format!(
                "Position {} splits a character",
                position
            )));
        }
        Ok(offset)
    }
}

/// Apply edits for one file
///
/// Edits must not overlap. Insertions at the same position land in the
/// order given.
pub fn apply_edits(text: &str, edits: &[RefactoringEdit]) -> Result<String> {
    let index = LineIndex::new(text);
    let mut resolved = Vec::with_capacity(edits.len());

    for (order, edit) in edits.iter().enumerate() {
        let start = index.offset(edit.range.start)?;
        let end = index.offset(edit.range.end)?;
        if start > end {
            return Err(InjectionError::InvalidEdit(format!(
                "Range {} ends before it starts",
                edit.range
            )));
        }
        resolved.push((start, end, order, edit.new_text.as_str()));
    }

    resolved.sort_by_key(|(start, _, order, _)| (*start, *order));
    for pair in resolved.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err(InjectionError::InvalidEdit(format!(
                "Edits {} and {} overlap",
                pair[0].2, pair[1].2
            )));
        }
    }

    // Apply from end to start so earlier offsets stay valid
    let mut result = text.to_string();
    for (start, end, _, new_text) in resolved.into_iter().rev() {
        result.replace_range(start..end, new_text);
    }

    Ok(result)
}
