//! Classes built through a static `create()` factory: plugins, forms,
//! controllers

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::analysis::scanner::indentation;
use crate::analysis::{ConstructionCall, FactoryMethodRegion, InstanceAssignment, MethodRegion};
use crate::error::{EngineNote, RegionKind};
use crate::types::{CompanionStatus, EditKind, Position, RefactoringEdit};

use super::source::{Injection, SourceEditor};
use super::{
    append_to_list, constructor_blocker, is_degraded, plan_dependencies, StrategyContext,
    StrategyOutput,
};

const CONTAINER_INTERFACE: &str = "Symfony\\Component\\DependencyInjection\\ContainerInterface";

static PLAIN_VARIABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$[A-Za-z_]\w*$").expect("plain variable regex"));

static EXTENDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bextends\b").expect("extends regex"));

static NAMED_ARGUMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*\s*:(?:[^:]|$)").expect("named argument regex"));

pub(super) fn compute(ctx: &StrategyContext<'_>) -> StrategyOutput {
    let mut output = StrategyOutput::empty(CompanionStatus::NotApplicable);
    let map = ctx.map;

    if !map.has_class_body()
        || is_degraded(map, RegionKind::Constructor)
        || is_degraded(map, RegionKind::FactoryMethod)
    {
        debug!("Class structure is incomplete, no edits computed");
        return output;
    }

    let planned = plan_dependencies(ctx, true, &mut output.notes);
    if planned.is_empty() {
        return output;
    }

    let instance_style = map
        .factory_method
        .as_ref()
        .is_some_and(|factory| factory.instance.is_some());
    if !instance_style {
        if let Some(note) = constructor_blocker(map) {
            output.notes.push(note);
            return output;
        }
    }

    let mut editor = SourceEditor::new(map, ctx.lines, ctx.config);
    let injections = editor.prepare(&planned);

    let mut members = Vec::new();
    let mut factory_edits = Vec::new();

    match &map.factory_method {
        Some(factory) => match (&factory.instance, &factory.construction) {
            (Some(instance), _) => {
                // Dependencies are set on the instance, the constructor stays
                members.extend(editor.property_edits(&injections));
                factory_edits.extend(instance_statements(ctx, factory, instance, &injections));
            }
            (None, Some(call)) => {
                let inherited = match &map.constructor {
                    Some(ctor) => {
                        if let Some(note) = misaligned_call(ctor, call) {
                            output.notes.push(note);
                            return output;
                        }
                        Vec::new()
                    }
                    None => match inherited_parameters(ctx, call) {
                        Some(inherited) => inherited,
                        None => {
                            output.notes.push(EngineNote::AnalysisDegraded {
                                region: RegionKind::Constructor,
                                reason: "constructor is missing and the factory passes arguments that cannot be forwarded".to_string(),
                            });
                            return output;
                        }
                    },
                };
                members.extend(editor.constructor_property_edits(&injections));
                members.extend(constructor_edits(&mut editor, ctx, &inherited, &injections));
                factory_edits.extend(construction_arguments(ctx, factory, call, &injections));
            }
            (None, None) => {
                output.notes.push(EngineNote::AnalysisDegraded {
                    region: RegionKind::FactoryMethod,
                    reason: "create() builds the instance in a way that cannot be extended"
                        .to_string(),
                });
                members.extend(editor.constructor_property_edits(&injections));
                members.extend(constructor_edits(&mut editor, ctx, &[], &injections));
            }
        },
        None => {
            let parameterless = map
                .constructor
                .as_ref()
                .map_or(true, |ctor| ctor.parameters.is_empty());
            members.extend(editor.constructor_property_edits(&injections));
            members.extend(constructor_edits(&mut editor, ctx, &[], &injections));
            if parameterless {
                factory_edits.extend(synthesized_factory(&mut editor, ctx, &injections));
            } else {
                output.notes.push(EngineNote::AnalysisDegraded {
                    region: RegionKind::FactoryMethod,
                    reason: "no create() factory and the constructor already takes parameters"
                        .to_string(),
                });
            }
        }
    }

    output.edits.extend(editor.import_edits());
    output.edits.extend(members);
    output.edits.extend(factory_edits);

    debug!(
        dependencies = injections.len(),
        edits = output.edits.len(),
        "Computed factory injection edits"
    );
    output
}

fn constructor_edits(
    editor: &mut SourceEditor<'_>,
    ctx: &StrategyContext<'_>,
    inherited: &[String],
    injections: &[Injection],
) -> Vec<RefactoringEdit> {
    match &ctx.map.constructor {
        Some(ctor) => editor.constructor_edits(ctor, injections),
        None => editor
            .synthesized_constructor(inherited, injections)
            .into_iter()
            .collect(),
    }
}

/// Note explaining why arguments appended to the construction call would not
/// line up with parameters appended to the constructor
///
/// Positional arguments must match the parameters one to one. Spread and
/// named arguments cannot be followed by a positional one.
fn misaligned_call(ctor: &MethodRegion, call: &ConstructionCall) -> Option<EngineNote> {
    let reason = if call
        .arguments
        .iter()
        .any(|argument| argument.starts_with("...") || NAMED_ARGUMENT_RE.is_match(argument))
    {
        "create() passes spread or named arguments to the constructor".to_string()
    } else if call.arguments.len() != ctor.parameters.len() {
        format!(
            "create() passes {} arguments to a constructor taking {}",
            call.arguments.len(),
            ctor.parameters.len()
        )
    } else {
        return None;
    };

    Some(EngineNote::AnalysisDegraded {
        region: RegionKind::FactoryMethod,
        reason,
    })
}

/// Parameters a new constructor must accept and pass to its parent
///
/// Only plain `$variable` arguments can be forwarded.
fn inherited_parameters(ctx: &StrategyContext<'_>, call: &ConstructionCall) -> Option<Vec<String>> {
    if call.arguments.is_empty() {
        return Some(Vec::new());
    }
    if !call
        .arguments
        .iter()
        .all(|argument| PLAIN_VARIABLE_RE.is_match(argument))
    {
        return None;
    }

    let class = ctx.map.class_declaration.as_ref()?;
    let body_line = class.body.map_or(class.line, |body| body.start.line);
    let extends = ctx
        .lines
        .get(class.line..=body_line)
        .is_some_and(|lines| lines.iter().any(|line| EXTENDS_RE.is_match(line)));

    // Without a parent the arguments are unused
    extends.then(|| call.arguments.clone())
}

fn fetch_expression(container: &str, service_id: &str) -> String {
    format!("${}->get('{}')", container, service_id)
}

fn construction_arguments(
    ctx: &StrategyContext<'_>,
    factory: &FactoryMethodRegion,
    call: &ConstructionCall,
    injections: &[Injection],
) -> Vec<RefactoringEdit> {
    let arguments: Vec<(String, String)> = injections
        .iter()
        .map(|injection| {
            (
                format!("Pass '{}' to the constructor", injection.service_id),
                fetch_expression(&factory.container_variable, &injection.service_id),
            )
        })
        .collect();

    append_to_list(
        ctx.lines,
        call.argument_list,
        call.last_argument,
        call.trailing_comma,
        EditKind::FactoryArgument,
        &arguments,
    )
}

fn instance_statements(
    ctx: &StrategyContext<'_>,
    factory: &FactoryMethodRegion,
    instance: &InstanceAssignment,
    injections: &[Injection],
) -> Vec<RefactoringEdit> {
    let indent = ctx
        .lines
        .get(instance.return_line)
        .map_or("", |line| indentation(line));

    injections
        .iter()
        .map(|injection| {
            RefactoringEdit::insert(
                EditKind::FactoryStatement,
                format!("Set ${}->{}", instance.variable, injection.property),
                Position::line_start(instance.return_line),
                format!(
                    "{}${}->{} = {};\n",
                    indent,
                    instance.variable,
                    injection.property,
                    fetch_expression(&factory.container_variable, &injection.service_id)
                ),
            )
        })
        .collect()
}

/// A new `create()` building the instance from the container
///
/// Goes right after the constructor, or after the synthesized one.
fn synthesized_factory(
    editor: &mut SourceEditor<'_>,
    ctx: &StrategyContext<'_>,
    injections: &[Injection],
) -> Option<RefactoringEdit> {
    let container_type = editor.type_reference(CONTAINER_INTERFACE);
    let container = ctx.config.container_variable.as_str();
    let indent = editor.member_indent().to_string();
    let body_indent = format!("{}{}", indent, ctx.config.indent);
    let argument_indent = format!("{}{}", body_indent, ctx.config.indent);

    let mut method = String::new();
    if ctx.config.emit_docblocks {
        method.push_str(&format!("{i}/**\n{i} * {{@inheritdoc}}\n{i} */\n", i = indent));
    }
    method.push_str(&format!(
        "{}public static function create({} ${}) {{\n{}return new static(\n",
        indent, container_type, container, body_indent
    ));
    let arguments: Vec<String> = injections
        .iter()
        .map(|injection| {
            format!(
                "{}{}",
                argument_indent,
                fetch_expression(container, &injection.service_id)
            )
        })
        .collect();
    method.push_str(&arguments.join(",\n"));
    method.push_str(&format!("\n{});\n{}}}\n", body_indent, indent));

    let (at, text) = match &ctx.map.constructor {
        Some(ctor) => (
            Position::line_start(ctor.end_line() + 1),
            format!("\n{}", method),
        ),
        None => editor.member_insertion(format!("{}\n", method))?,
    };

    Some(RefactoringEdit::insert(
        EditKind::FactoryMethod,
        "Create create() factory method",
        at,
        text,
    ))
}
