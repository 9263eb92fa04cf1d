//! Merge strategies
//!
//! A strategy takes the region map of one class plus the requested services
//! and produces the edits that inject the services that are not there yet.
//! Which strategy runs depends on how the class gets instantiated.

pub mod companion;
mod factory;
mod service;
mod source;

pub use companion::{CompanionFile, CompanionLocator, ModuleServicesLocator, NoCompanion};

use std::collections::HashSet;

use tracing::debug;

use crate::analysis::scanner::indentation;
use crate::analysis::SourceRegionMap;
use crate::config::InjectionConfig;
use crate::error::{EngineNote, RegionKind};
use crate::registry::RegistrySnapshot;
use crate::resolver::{property_name_for_service, AbstractionInfo, CapabilityResolver};
use crate::types::{
    ArtifactKind, CompanionStatus, EditKind, InjectionRequest, Position, RefactoringEdit,
    TextRange,
};

/// Everything a strategy reads while computing edits
pub struct StrategyContext<'a> {
    /// The injection request
    pub request: InjectionRequest<'a>,
    /// Regions of the analyzed class
    pub map: &'a SourceRegionMap,
    /// Source split into lines
    pub lines: &'a [&'a str],
    /// Abstraction lookup
    pub resolver: &'a CapabilityResolver<'a>,
    /// Registry snapshot used for companion matching
    pub registry: &'a RegistrySnapshot,
    /// Finds the companion service definitions
    pub locator: &'a dyn CompanionLocator,
    /// Code generation options
    pub config: &'a InjectionConfig,
}

/// Edits and notes produced by one strategy run
#[derive(Debug, Clone)]
pub struct StrategyOutput {
    /// Edits in emission order, possibly for two files
    pub edits: Vec<RefactoringEdit>,
    /// Companion definition outcome
    pub companion: CompanionStatus,
    /// Non-fatal conditions
    pub notes: Vec<EngineNote>,
}

impl StrategyOutput {
    fn empty(companion: CompanionStatus) -> Self {
        Self {
            edits: Vec::new(),
            companion,
            notes: Vec::new(),
        }
    }
}

/// Strategy selected by artifact kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Constructor plus static `create()` factory
    FactoryInstantiated,
    /// Constructor plus companion `*.services.yml` entry
    RegistryInstantiated,
}

impl MergeStrategy {
    /// Strategy for an artifact kind
    pub fn for_kind(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::FactoryInstantiated => MergeStrategy::FactoryInstantiated,
            ArtifactKind::RegistryInstantiated => MergeStrategy::RegistryInstantiated,
        }
    }

    /// Compute the edits for a request
    pub fn compute(&self, ctx: &StrategyContext<'_>) -> StrategyOutput {
        match self {
            MergeStrategy::FactoryInstantiated => factory::compute(ctx),
            MergeStrategy::RegistryInstantiated => service::compute(ctx),
        }
    }
}

/// A requested service that is not injected yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedDependency {
    pub service_id: String,
    pub property: String,
    pub type_info: Option<AbstractionInfo>,
}

/// Filter the requested services down to the net-new ones
///
/// Typing prefers the resolved abstraction, then the implementing class. A
/// service is already injected when its property exists (declared or
/// promoted), when the constructor has a parameter of that name, or when
/// `check_fetches` is set and the factory already fetches it.
pub(crate) fn plan_dependencies(
    ctx: &StrategyContext<'_>,
    check_fetches: bool,
    notes: &mut Vec<EngineNote>,
) -> Vec<PlannedDependency> {
    let mut seen = HashSet::new();
    let mut claimed = HashSet::new();
    let mut planned = Vec::new();

    for request in ctx.request.dependencies {
        let service_id = request.service_id.as_str();
        if !seen.insert(service_id) {
            debug!("Skipping duplicate request for '{}'", service_id);
            continue;
        }

        let abstraction = ctx.resolver.resolve(request);
        let missed = abstraction.is_none();
        let type_info = abstraction.or_else(|| ctx.resolver.resolve_implementation(service_id));
        let property = type_info
            .as_ref()
            .map(|info| info.property_name.clone())
            .unwrap_or_else(|| property_name_for_service(service_id));

        let has_parameter = ctx
            .map
            .constructor
            .as_ref()
            .is_some_and(|ctor| ctor.parameter(&property).is_some());
        if ctx.map.declares_property(&property)
            || has_parameter
            || (check_fetches && ctx.map.fetches_service(service_id))
        {
            debug!("'{}' is already injected as ${}", service_id, property);
            continue;
        }
        if !claimed.insert(property.clone()) {
            debug!(
                "Skipping '{}': property ${} is claimed by another request",
                service_id, property
            );
            continue;
        }

        if missed {
            debug!("No abstraction resolved for '{}'", service_id);
            notes.push(EngineNote::ResolutionMiss {
                service_id: service_id.to_string(),
            });
        }
        planned.push(PlannedDependency {
            service_id: service_id.to_string(),
            property,
            type_info,
        });
    }

    planned
}

/// Whether analysis of a region failed
pub(crate) fn is_degraded(map: &SourceRegionMap, region: RegionKind) -> bool {
    map.notes.iter().any(|note| {
        matches!(note, EngineNote::AnalysisDegraded { region: degraded, .. } if *degraded == region)
    })
}

/// Note explaining why new parameters cannot be appended to the constructor
///
/// A required parameter may not follow an optional or variadic one, and
/// arguments appended by callers would bind to the optional parameter.
pub(crate) fn constructor_blocker(map: &SourceRegionMap) -> Option<EngineNote> {
    let ctor = map.constructor.as_ref()?;
    let optional = ctor.parameters.iter().find(|param| param.optional)?;
    debug!("Constructor parameter ${} is optional", optional.name);
    Some(EngineNote::AnalysisDegraded {
        region: RegionKind::Constructor,
        reason: format!(
            "constructor parameter ${} is optional, so new parameters cannot follow it",
            optional.name
        ),
    })
}

/// Insertions appending items to a bracketed, comma-separated list
///
/// Follows the existing layout: items on one line get `, item`, one item per
/// line gets a new line at the indentation of the last item, and a trailing
/// comma stays trailing.
pub(crate) fn append_to_list(
    lines: &[&str],
    brackets: TextRange,
    last_item: Option<TextRange>,
    trailing_comma: bool,
    kind: EditKind,
    items: &[(String, String)],
) -> Vec<RefactoringEdit> {
    let Some(last) = last_item else {
        let at = Position::new(brackets.start.line, brackets.start.character + 1);
        return items
            .iter()
            .enumerate()
            .map(|(index, (description, text))| {
                let text = if index == 0 {
                    text.clone()
                } else {
                    format!(", {}", text)
                };
                RefactoringEdit::insert(kind, description.clone(), at, text)
            })
            .collect();
    };

    let multiline = last.start.line > brackets.start.line;
    let indent = lines.get(last.start.line).map_or("", |line| indentation(line));
    let closer_on_own_line = brackets.end.line > last.end.line
        && lines
            .get(brackets.end.line)
            .and_then(|line| line.get(..brackets.end.character))
            .is_some_and(|prefix| prefix.trim().is_empty());

    items
        .iter()
        .map(|(description, text)| {
            let (at, text) = match (trailing_comma, multiline) {
                (true, true) if closer_on_own_line => (
                    Position::line_start(brackets.end.line),
                    format!("{}{},\n", indent, text),
                ),
                (true, true) => (brackets.end, format!("\n{}{},", indent, text)),
                (true, false) => (brackets.end, format!(" {},", text)),
                (false, true) => (last.end, format!(",\n{}{}", indent, text)),
                (false, false) => (last.end, format!(", {}", text)),
            };
            RefactoringEdit::insert(kind, description.clone(), at, text)
        })
        .collect()
}

/// Anchor and text for inserting whole lines after `line`
///
/// When `line` is the last one and the text lacks a final newline, the
/// insertion goes at the end of that line instead.
pub(crate) fn insert_after_line(
    lines: &[&str],
    ends_with_newline: bool,
    line: usize,
    text: &str,
) -> (Position, String) {
    if line + 1 < lines.len() || ends_with_newline {
        (Position::line_start(line + 1), text.to_string())
    } else {
        let end = lines.get(line).map_or(0, |content| content.len());
        (
            Position::new(line, end),
            format!("\n{}", text.trim_end_matches('\n')),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::scanner::{find_matching, split_list};

    fn append(source: &str, items: &[&str]) -> Vec<RefactoringEdit> {
        let lines: Vec<&str> = source.lines().collect();
        let brackets =
            find_matching(&lines, Position::new(0, 0), b'(', b')', None).expect("brackets");
        let list = split_list(&lines, brackets);
        let items: Vec<(String, String)> = items
            .iter()
            .map(|item| (format!("Add {}", item), item.to_string()))
            .collect();
        append_to_list(
            &lines,
            brackets,
            list.items.last().map(|item| item.range),
            list.trailing_comma,
            EditKind::ConstructorParameter,
            &items,
        )
    }

    #[test]
    fn test_append_single_line() {
        let edits = append("f(Foo $foo) {", &["Bar $bar"]);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range.start, Position::new(0, 10));
        assert_eq!(edits[0].new_text, ", Bar $bar");
    }

    #[test]
    fn test_append_to_empty_list() {
        let edits = append("f() {", &["A $a", "B $b"]);
        assert_eq!(edits[0].range.start, Position::new(0, 2));
        assert_eq!(edits[0].new_text, "A $a");
        assert_eq!(edits[1].new_text, ", B $b");
    }

    #[test]
    fn test_append_multi_line_trailing_comma() {
        let edits = append("f(\n    Foo $foo,\n  ) {", &["Bar $bar"]);
        assert_eq!(edits[0].range.start, Position::line_start(2));
        assert_eq!(edits[0].new_text, "    Bar $bar,\n");
    }

    #[test]
    fn test_append_multi_line_without_trailing_comma() {
        let edits = append("f(\n    Foo $foo\n  ) {", &["Bar $bar"]);
        assert_eq!(edits[0].range.start, Position::new(1, 12));
        assert_eq!(edits[0].new_text, ",\n    Bar $bar");
    }

    #[test]
    fn test_insert_after_last_line_without_newline() {
        let lines = vec!["a:", "  b: c"];
        let (at, text) = insert_after_line(&lines, false, 1, "  d: e\n");
        assert_eq!(at, Position::new(1, 6));
        assert_eq!(text, "\n  d: e");

        let (at, text) = insert_after_line(&lines, true, 1, "  d: e\n");
        assert_eq!(at, Position::line_start(2));
        assert_eq!(text, "  d: e\n");
    }
}
