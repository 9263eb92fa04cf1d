//! Combining strategy output into per-file, validated edit lists

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{InjectionError, Result};
use crate::types::{EditTarget, FileEdits, RefactoringEdit};

/// Groups edits by file, orders them and rejects overlaps
pub struct EditAggregator;

impl EditAggregator {
    /// Aggregate edits emitted by a strategy
    ///
    /// The analyzed file comes first, companion files follow in order of
    /// first appearance. Within a file edits are sorted by start position,
    /// keeping emission order for equal positions. Insertions of the same kind
    /// at the same anchor are merged into one edit.
    pub fn aggregate(edits: Vec<RefactoringEdit>, source_path: &Path) -> Result<Vec<FileEdits>> {
        let mut files: Vec<FileEdits> = Vec::new();

        for edit in edits {
            match files.iter_mut().find(|file| file.target == edit.target) {
                Some(file) => file.edits.push(edit),
                None => files.push(FileEdits {
                    target: edit.target.clone(),
                    edits: vec![edit],
                }),
            }
        }
        // Stable, so companions keep their relative order
        files.sort_by_key(|file| !matches!(file.target, EditTarget::Source));

        for file in &mut files {
            file.edits.sort_by_key(|edit| edit.range.start);
            file.edits = merge_insertions(std::mem::take(&mut file.edits));
            validate(file, source_path)?;
            debug!(
                file = %target_name(&file.target, source_path),
                edits = file.edits.len(),
                "Aggregated edits"
            );
        }

        Ok(files)
    }
}

fn merge_insertions(edits: Vec<RefactoringEdit>) -> Vec<RefactoringEdit> {
    let mut merged: Vec<RefactoringEdit> = Vec::with_capacity(edits.len());

    for edit in edits {
        if let Some(last) = merged.last_mut() {
            if last.range.is_empty()
                && edit.range.is_empty()
                && last.range.start == edit.range.start
                && last.kind == edit.kind
            {
                last.new_text.push_str(&edit.new_text);
                last.description = format!("{}; {}", last.description, edit.description);
                continue;
            }
        }
        merged.push(edit);
    }

    merged
}

fn validate(file: &FileEdits, source_path: &Path) -> Result<()> {
    let mut previous: Option<&RefactoringEdit> = None;

    for edit in &file.edits {
        if let Some(prev) = previous {
            if edit.range.start < prev.range.end {
                let file_name = target_name(&file.target, source_path);
                warn!(
                    "Rejecting overlapping edits in {}: {} and {}",
                    file_name, prev.range, edit.range
                );
                return Err(InjectionError::AggregationConflict {
                    file: file_name,
                    first: prev.range,
                    second: edit.range,
                });
            }
        }
        if previous.map_or(true, |prev| edit.range.end >= prev.range.end) {
            previous = Some(edit);
        }
    }

    Ok(())
}

fn target_name(target: &EditTarget, source_path: &Path) -> String {
    match target {
        EditTarget::Source => source_path.display().to_string(),
        EditTarget::Companion(path) => path.display().to_string(),
    }
}
