//! Preview generation for injection change-sets

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use crate::applier::apply_edits;
use crate::error::{InjectionError, Result};
use crate::strategies::CompanionFile;
use crate::types::{ChangeSet, EditTarget};

/// Preview of the changes to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePreview {
    /// File path
    pub path: PathBuf,
    /// Text after applying the edits
    pub updated: String,
    /// Unified diff against the current text
    pub diff: String,
    /// Number of added lines
    pub additions: usize,
    /// Number of removed lines
    pub deletions: usize,
}

/// Preview of a whole change-set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetPreview {
    /// One entry per changed file, analyzed file first
    pub files: Vec<FilePreview>,
}

impl ChangeSetPreview {
    /// All file diffs concatenated
    pub fn unified_diff(&self) -> String {
        self.files.iter().map(|file| file.diff.as_str()).collect()
    }
}

/// Generates previews of change-sets
#[derive(Debug, Clone, Default)]
pub struct PreviewGenerator;

impl PreviewGenerator {
    /// Create a new preview generator
    pub fn new() -> Self {
        Self
    }

    /// Apply a change-set in memory and diff every file it touches
    ///
    /// The companion text is required when the change-set edits a companion
    /// file.
    pub fn preview(
        &self,
        change_set: &ChangeSet,
        source_path: &Path,
        source_text: &str,
        companion: Option<&CompanionFile>,
    ) -> Result<ChangeSetPreview> {
        let mut files = Vec::new();

        for file in &change_set.files {
            if file.edits.is_empty() {
                continue;
            }
            let (path, original) = match &file.target {
                EditTarget::Source => (source_path, source_text),
                EditTarget::Companion(path) => match companion {
                    Some(companion) if &companion.path == path => {
                        (path.as_path(), companion.text.as_str())
                    }
                    _ => {
                        return Err(InjectionError::InvalidEdit(format!(
                            "No text supplied for {}",
                            path.display()
                        )))
                    }
                },
            };

            let updated = apply_edits(original, &file.edits)?;
            files.push(Self::file_preview(path, original, updated));
        }

        Ok(ChangeSetPreview { files })
    }

    /// Generate a unified diff between original and updated content
    pub fn generate_unified_diff(original: &str, updated: &str, path: &Path) -> String {
        let display = path.display().to_string();
        TextDiff::from_lines(original, updated)
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", display), &format!("b/{}", display))
            .to_string()
    }

    fn file_preview(path: &Path, original: &str, updated: String) -> FilePreview {
        let diff = TextDiff::from_lines(original, updated.as_str());
        let mut additions = 0;
        let mut deletions = 0;
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => additions += 1,
                ChangeTag::Delete => deletions += 1,
                ChangeTag::Equal => {}
            }
        }

        FilePreview {
            path: path.to_path_buf(),
            diff: Self::generate_unified_diff(original, &updated, path),
            updated,
            additions,
            deletions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompanionStatus, EditKind, FileEdits, Position, RefactoringEdit};

    fn change_set(files: Vec<FileEdits>) -> ChangeSet {
        ChangeSet {
            id: "preview".to_string(),
            files,
            companion: CompanionStatus::NotApplicable,
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_unified_diff_headers_and_hunks() {
        let diff = PreviewGenerator::generate_unified_diff(
            "a\nb\n",
            "a\nx\nb\n",
            Path::new("src/Foo.php"),
        );

        assert!(diff.contains("--- a/src/Foo.php"));
        assert!(diff.contains("+++ b/src/Foo.php"));
        assert!(diff.contains("@@"));
        assert!(diff.contains("+x"));
    }

    #[test]
    fn test_preview_source_and_companion() -> Result<()> {
        let companion = CompanionFile::new("example.services.yml", "services:\n  a:\n    class: A\n");
        let set = change_set(vec![
            FileEdits {
                target: EditTarget::Source,
                edits: vec![RefactoringEdit::insert(
                    EditKind::Import,
                    "Import",
                    Position::line_start(1),
                    "use Foo;\n",
                )],
            },
            FileEdits {
                target: EditTarget::Companion(companion.path.clone()),
                edits: vec![RefactoringEdit::insert(
                    EditKind::CompanionArgument,
                    "Arguments",
                    Position::line_start(3),
                    "    arguments: ['@foo']\n",
                )],
            },
        ]);

        let preview = PreviewGenerator::new().preview(
            &set,
            Path::new("src/A.php"),
            "<?php\nclass A {}\n",
            Some(&companion),
        )?;

        assert_eq!(preview.files.len(), 2);
        assert_eq!(preview.files[0].updated, "<?php\nuse Foo;\nclass A {}\n");
        assert_eq!(preview.files[0].additions, 1);
        assert_eq!(preview.files[0].deletions, 0);
        assert!(preview.files[1].updated.ends_with("    arguments: ['@foo']\n"));
        assert!(preview.unified_diff().contains("+++ b/example.services.yml"));

        Ok(())
    }

    #[test]
    fn test_preview_requires_companion_text() {
        let set = change_set(vec![FileEdits {
            target: EditTarget::Companion(PathBuf::from("example.services.yml")),
            edits: vec![RefactoringEdit::insert(
                EditKind::CompanionArgument,
                "Arguments",
                Position::line_start(0),
                "x",
            )],
        }]);

        let result = PreviewGenerator::new().preview(&set, Path::new("src/A.php"), "", None);
        assert!(matches!(result, Err(InjectionError::InvalidEdit(_))));
    }
}
