//! Core data types shared by the analyzer, strategies and aggregator

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineNote;

/// Position in a text document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (0-based)
    pub line: usize,
    /// Byte offset within the line (0-based)
    pub character: usize,
}

impl Position {
    /// Create a new position
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }

    /// Start of the given line
    pub fn line_start(line: usize) -> Self {
        Self { line, character: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// Half-open range between two positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    /// Start position (inclusive)
    pub start: Position,
    /// End position (exclusive)
    pub end: Position,
}

impl TextRange {
    /// Create a new range
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-width range at a position
    pub fn point(at: Position) -> Self {
        Self { start: at, end: at }
    }

    /// Whether the range is an insertion point
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// How a class gets instantiated, which selects the merge strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Plugins, forms and controllers built through a static `create()` factory
    FactoryInstantiated,
    /// Services constructed by the container from a `*.services.yml` entry
    RegistryInstantiated,
}

/// A service to inject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRequest {
    /// Registry key, e.g. `entity_type.manager`
    pub service_id: String,
    /// Fully-qualified type forced by the caller
    pub type_override: Option<String>,
}

impl DependencyRequest {
    /// Request a service by identifier
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            type_override: None,
        }
    }

    /// Force the parameter type instead of resolving it
    pub fn with_type(mut self, fqn: impl Into<String>) -> Self {
        self.type_override = Some(fqn.into());
        self
    }
}

/// Category of a computed edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// `use` statement insertion
    Import,
    /// Property docblock and declaration
    Property,
    /// Parameter appended to an existing constructor
    ConstructorParameter,
    /// `$this->x = $x;` appended to an existing constructor body
    ConstructorAssignment,
    /// Newly synthesized constructor
    Constructor,
    /// Argument appended to the factory's construction call
    FactoryArgument,
    /// Statement appended to the factory body
    FactoryStatement,
    /// Newly synthesized factory method
    FactoryMethod,
    /// Service reference appended to a companion definition
    CompanionArgument,
}

/// File an edit applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "path", rename_all = "snake_case")]
pub enum EditTarget {
    /// The analyzed class file
    Source,
    /// A companion service definition file
    Companion(PathBuf),
}

/// A single textual edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactoringEdit {
    /// Human-readable summary
    pub description: String,
    /// Edit category
    pub kind: EditKind,
    /// Range to replace
    pub range: TextRange,
    /// Replacement text
    pub new_text: String,
    /// File the edit applies to
    pub target: EditTarget,
}

impl RefactoringEdit {
    /// Insertion into the analyzed file
    pub fn insert(
        kind: EditKind,
        description: impl Into<String>,
        at: Position,
        new_text: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            kind,
            range: TextRange::point(at),
            new_text: new_text.into(),
            target: EditTarget::Source,
        }
    }

    /// Redirect the edit to another file
    pub fn for_target(mut self, target: EditTarget) -> Self {
        self.target = target;
        self
    }
}

/// Edits for one file, ordered by position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdits {
    /// Target file
    pub target: EditTarget,
    /// Non-overlapping edits in ascending position order
    pub edits: Vec<RefactoringEdit>,
}

/// Outcome of the companion configuration update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompanionStatus {
    /// The artifact has no companion definition
    NotApplicable,
    /// The definition's arguments were extended
    Updated {
        /// Companion file path
        path: PathBuf,
    },
    /// The definition already references every dependency
    Unchanged {
        /// Companion file path
        path: PathBuf,
    },
    /// No matching definition, so only the class file is edited
    NotFound,
}

/// Combined, validated edits for one injection request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Request identifier for log correlation
    pub id: String,
    /// Edits grouped by target file
    pub files: Vec<FileEdits>,
    /// What happened to the companion definition
    pub companion: CompanionStatus,
    /// Non-fatal conditions met while computing the edits
    pub notes: Vec<EngineNote>,
}

impl ChangeSet {
    /// Whether no file would change
    pub fn is_empty(&self) -> bool {
        self.files.iter().all(|file| file.edits.is_empty())
    }

    /// Total number of edits across all files
    pub fn edit_count(&self) -> usize {
        self.files.iter().map(|file| file.edits.len()).sum()
    }

    /// Edits for one target, empty when the target is untouched
    pub fn edits_for(&self, target: &EditTarget) -> &[RefactoringEdit] {
        self.files
            .iter()
            .find(|file| &file.target == target)
            .map(|file| file.edits.as_slice())
            .unwrap_or(&[])
    }

    /// Edits for the analyzed class file
    pub fn source_edits(&self) -> &[RefactoringEdit] {
        self.edits_for(&EditTarget::Source)
    }

    /// Edits of one kind in the analyzed class file
    pub fn source_edits_of(&self, kind: EditKind) -> Vec<&RefactoringEdit> {
        self.source_edits()
            .iter()
            .filter(|edit| edit.kind == kind)
            .collect()
    }

    /// Edits for any companion file
    pub fn companion_edits(&self) -> Vec<&RefactoringEdit> {
        self.files
            .iter()
            .filter(|file| matches!(file.target, EditTarget::Companion(_)))
            .flat_map(|file| file.edits.iter())
            .collect()
    }
}

/// Input of a single injection request
#[derive(Debug, Clone, Copy)]
pub struct InjectionRequest<'a> {
    /// Path of the analyzed class file
    pub source_path: &'a Path,
    /// Current text of the class file
    pub source: &'a str,
    /// Services to inject, in the order they should appear
    pub dependencies: &'a [DependencyRequest],
    /// How the class is instantiated
    pub kind: ArtifactKind,
}

impl<'a> InjectionRequest<'a> {
    /// Create a new request
    pub fn new(
        source_path: &'a Path,
        source: &'a str,
        dependencies: &'a [DependencyRequest],
        kind: ArtifactKind,
    ) -> Self {
        Self {
            source_path,
            source,
            dependencies,
            kind,
        }
    }
}
