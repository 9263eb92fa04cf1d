//! Companion `*.services.yml` entries of registry-instantiated classes
//!
//! The entry is edited as text so that comments, key order and quoting of
//! everything else in the file survive. `serde_yaml` is only used to find
//! which entry belongs to the class.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::scanner::{find_matching, indentation, split_list, ListItems};
use crate::error::EngineNote;
use crate::registry::RegistrySnapshot;
use crate::types::{CompanionStatus, EditKind, EditTarget, Position, RefactoringEdit, TextRange};

use super::{append_to_list, insert_after_line, StrategyContext};

/// Service definitions file and its current text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionFile {
    /// Path of the `*.services.yml` file
    pub path: PathBuf,
    /// Current text
    pub text: String,
}

impl CompanionFile {
    /// Create a companion file from already loaded text
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Finds the service definitions file for a class file
pub trait CompanionLocator {
    /// Companion file for the class at `source_path`, if there is one
    fn locate(&self, source_path: &Path) -> Option<CompanionFile>;
}

impl<F> CompanionLocator for F
where
    F: Fn(&Path) -> Option<CompanionFile>,
{
    fn locate(&self, source_path: &Path) -> Option<CompanionFile> {
        self(source_path)
    }
}

/// Locator for callers without service definitions
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompanion;

impl CompanionLocator for NoCompanion {
    fn locate(&self, _source_path: &Path) -> Option<CompanionFile> {
        None
    }
}

/// Reads `{module}.services.yml` next to the closest `{module}.info.yml`
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleServicesLocator;

impl CompanionLocator for ModuleServicesLocator {
    fn locate(&self, source_path: &Path) -> Option<CompanionFile> {
        for dir in source_path.ancestors().skip(1) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let module = entries.filter_map(|entry| entry.ok()).find_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".info.yml").map(str::to_string)
            });
            let Some(module) = module else {
                continue;
            };

            let path = dir.join(format!("{}.services.yml", module));
            return match std::fs::read_to_string(&path) {
                Ok(text) => Some(CompanionFile { path, text }),
                Err(error) => {
                    debug!("Module '{}' has no readable services file: {}", module, error);
                    None
                }
            };
        }
        None
    }
}

/// Edits and outcome for the companion file
#[derive(Debug, Clone)]
pub(crate) struct CompanionUpdate {
    pub edits: Vec<RefactoringEdit>,
    pub status: CompanionStatus,
    pub notes: Vec<EngineNote>,
}

impl CompanionUpdate {
    fn not_found(path: Option<PathBuf>) -> Self {
        Self {
            edits: Vec::new(),
            status: CompanionStatus::NotFound,
            notes: vec![EngineNote::CompanionNotFound { path }],
        }
    }
}

/// Append references to `service_ids` to the class's service entry
pub(crate) fn update_companion(ctx: &StrategyContext<'_>, service_ids: &[&str]) -> CompanionUpdate {
    let Some(file) = ctx.locator.locate(ctx.request.source_path) else {
        debug!(
            "No companion service file for {}",
            ctx.request.source_path.display()
        );
        return CompanionUpdate::not_found(None);
    };

    let declared = match RegistrySnapshot::from_yaml_str(&file.text) {
        Ok(declared) => declared,
        Err(error) => {
            warn!("Failed to parse {}: {}", file.path.display(), error);
            return CompanionUpdate::not_found(Some(file.path));
        }
    };

    let lines: Vec<&str> = file.text.lines().collect();
    let entries = service_entries(&lines);
    let Some(entry) = find_entry(ctx, &entries, &declared) else {
        debug!("No service entry in {} matches the class", file.path.display());
        return CompanionUpdate::not_found(Some(file.path));
    };

    let ends_with_newline = file.text.ends_with('\n');
    let Some(edits) = reference_edits(&lines, ends_with_newline, entry, service_ids) else {
        warn!(
            "Service '{}' in {} has arguments that cannot be extended",
            entry.id,
            file.path.display()
        );
        return CompanionUpdate::not_found(Some(file.path));
    };

    if edits.is_empty() {
        return CompanionUpdate {
            edits,
            status: CompanionStatus::Unchanged { path: file.path },
            notes: Vec::new(),
        };
    }

    debug!(
        "Adding {} argument(s) to service '{}'",
        edits.len(),
        entry.id
    );
    let target = EditTarget::Companion(file.path.clone());
    CompanionUpdate {
        edits: edits
            .into_iter()
            .map(|edit| edit.for_target(target.clone()))
            .collect(),
        status: CompanionStatus::Updated { path: file.path },
        notes: Vec::new(),
    }
}

/// One key directly under `services:`
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServiceEntry {
    id: String,
    key_line: usize,
    /// Last non-blank line belonging to the entry
    end_line: usize,
    /// Text after the key's colon
    inline_value: String,
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// Split `key: value` at the first colon followed by whitespace or the end
fn split_key(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().find_map(|(index, &byte)| {
        let boundary = bytes
            .get(index + 1)
            .map_or(true, |next| next.is_ascii_whitespace());
        (byte == b':' && boundary).then(|| (&text[..index], &text[index + 1..]))
    })
}

fn service_entries(lines: &[&str]) -> Vec<ServiceEntry> {
    let Some(services_line) = lines
        .iter()
        .position(|line| line.starts_with("services:"))
    else {
        return Vec::new();
    };

    let mut entries: Vec<ServiceEntry> = Vec::new();
    let mut entry_indent = None;

    for (index, line) in lines.iter().enumerate().skip(services_line + 1) {
        if is_blank_or_comment(line) {
            continue;
        }
        let indent = indentation(line).len();
        if indent == 0 {
            break;
        }
        let entry_indent = *entry_indent.get_or_insert(indent);

        if indent == entry_indent {
            if let Some((key, value)) = split_key(line.trim()) {
                entries.push(ServiceEntry {
                    id: unquote(key).to_string(),
                    key_line: index,
                    end_line: index,
                    inline_value: value.trim().to_string(),
                });
            }
        } else if indent > entry_indent {
            if let Some(entry) = entries.last_mut() {
                entry.end_line = index;
            }
        } else {
            break;
        }
    }

    entries
}

/// Entry for the analyzed class
///
/// Tried in order: the registry record for the class file, the registry
/// record for the class name, a `class:` match in the companion itself.
fn find_entry<'e>(
    ctx: &StrategyContext<'_>,
    entries: &'e [ServiceEntry],
    declared: &RegistrySnapshot,
) -> Option<&'e ServiceEntry> {
    let by_id = |id: &str| entries.iter().find(|entry| entry.id == id);

    if let Some(entry) = ctx
        .registry
        .find_by_source_path(ctx.request.source_path)
        .and_then(|record| by_id(&record.id))
    {
        return Some(entry);
    }

    let fqcn = ctx.map.fqcn()?;
    if let Some(entry) = ctx
        .registry
        .find_by_class(&fqcn)
        .and_then(|record| by_id(&record.id))
    {
        return Some(entry);
    }

    declared
        .find_by_class(&fqcn)
        .and_then(|record| by_id(&record.id))
}

/// How an entry lists its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
enum Arguments {
    /// `arguments: ['@a', '@b']`, possibly over several lines
    Flow { brackets: TextRange, list: ListItems },
    /// `arguments:` followed by `- '@a'` items
    Block {
        anchor_line: usize,
        item_indent: String,
        values: Vec<String>,
    },
    /// No `arguments:` key
    Missing { child_indent: String },
}

impl Arguments {
    fn values(&self) -> Vec<&str> {
        match self {
            Arguments::Flow { list, .. } => list.items.iter().map(|item| unquote(&item.text)).collect(),
            Arguments::Block { values, .. } => values.iter().map(|value| unquote(value)).collect(),
            Arguments::Missing { .. } => Vec::new(),
        }
    }

    fn references(&self, service_id: &str) -> bool {
        self.values().iter().any(|value| {
            value
                .strip_prefix("@?")
                .or_else(|| value.strip_prefix('@'))
                .is_some_and(|id| id == service_id)
        })
    }

    fn quote(&self) -> char {
        match self.values_raw_first() {
            Some(first) if first.starts_with('"') => '"',
            _ => '\'',
        }
    }

    fn values_raw_first(&self) -> Option<&str> {
        match self {
            Arguments::Flow { list, .. } => list.items.first().map(|item| item.text.as_str()),
            Arguments::Block { values, .. } => values.first().map(String::as_str),
            Arguments::Missing { .. } => None,
        }
    }
}

fn entry_arguments(lines: &[&str], entry: &ServiceEntry) -> Option<Arguments> {
    if !entry.inline_value.is_empty() && !entry.inline_value.starts_with('#') {
        // `id: ~`, `id: '@alias'` or a flow mapping
        return None;
    }

    let child_indent = (entry.key_line + 1..=entry.end_line)
        .filter_map(|index| lines.get(index))
        .find(|line| !is_blank_or_comment(line))
        .map(|line| indentation(line).to_string())
        .unwrap_or_else(|| format!("{}  ", indentation(lines[entry.key_line])));

    for index in entry.key_line + 1..=entry.end_line {
        let line = lines[index];
        if indentation(line).len() != child_indent.len() {
            continue;
        }
        let Some(rest) = line.trim_start().strip_prefix("arguments:") else {
            continue;
        };
        let rest = rest.trim();

        if rest.starts_with('[') {
            let column = line.find('[')?;
            let brackets =
                find_matching(lines, Position::new(index, column), b'[', b']', None).ok()?;
            let list = split_list(lines, brackets);
            return Some(Arguments::Flow { brackets, list });
        }

        if rest.is_empty() || rest.starts_with('#') {
            let mut anchor_line = index;
            let mut item_indent = None;
            let mut values = Vec::new();

            for next in index + 1..=entry.end_line {
                let line = lines[next];
                if is_blank_or_comment(line) {
                    continue;
                }
                let indent = indentation(line);
                let trimmed = line.trim_start();
                match trimmed.strip_prefix('-') {
                    Some(value) if indent.len() >= child_indent.len() => {
                        item_indent.get_or_insert_with(|| indent.to_string());
                        values.push(value.trim().to_string());
                        anchor_line = next;
                    }
                    _ if indent.len() > child_indent.len() && !values.is_empty() => {
                        anchor_line = next;
                    }
                    _ => break,
                }
            }

            return Some(Arguments::Block {
                anchor_line,
                item_indent: item_indent.unwrap_or_else(|| format!("{}  ", child_indent)),
                values,
            });
        }

        return None;
    }

    Some(Arguments::Missing { child_indent })
}

/// Insertions adding the references the entry does not have yet
///
/// `None` when the entry's arguments cannot be extended.
fn reference_edits(
    lines: &[&str],
    ends_with_newline: bool,
    entry: &ServiceEntry,
    service_ids: &[&str],
) -> Option<Vec<RefactoringEdit>> {
    let arguments = entry_arguments(lines, entry)?;
    let quote = arguments.quote();
    let missing: Vec<(String, String)> = service_ids
        .iter()
        .filter(|id| !arguments.references(id))
        .map(|id| {
            (
                format!("Pass '@{}' to service '{}'", id, entry.id),
                format!("{q}@{id}{q}", q = quote, id = id),
            )
        })
        .collect();

    if missing.is_empty() {
        return Some(Vec::new());
    }

    let edits = match &arguments {
        Arguments::Flow { brackets, list } => append_to_list(
            lines,
            *brackets,
            list.items.last().map(|item| item.range),
            list.trailing_comma,
            EditKind::CompanionArgument,
            &missing,
        ),
        Arguments::Block {
            anchor_line,
            item_indent,
            ..
        } => missing
            .into_iter()
            .map(|(description, reference)| {
                let (at, text) = insert_after_line(
                    lines,
                    ends_with_newline,
                    *anchor_line,
                    &format!("{}- {}\n", item_indent, reference),
                );
                RefactoringEdit::insert(EditKind::CompanionArgument, description, at, text)
            })
            .collect(),
        Arguments::Missing { child_indent } => {
            let references: Vec<&str> = missing.iter().map(|(_, reference)| reference.as_str()).collect();
            let (at, text) = insert_after_line(
                lines,
                ends_with_newline,
                entry.end_line,
                &format!("{}arguments: [{}]\n", child_indent, references.join(", ")),
            );
            vec![RefactoringEdit::insert(
                EditKind::CompanionArgument,
                format!("Add arguments to service '{}'", entry.id),
                at,
                text,
            )]
        }
    };

    Some(edits)
}
