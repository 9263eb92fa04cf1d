//! Edits to the class source shared by both strategies

use crate::analysis::scanner::indentation;
use crate::analysis::{MethodRegion, SourceRegionMap};
use crate::config::InjectionConfig;
use crate::resolver::AbstractionInfo;
use crate::types::{EditKind, Position, RefactoringEdit};

use super::{append_to_list, PlannedDependency};

/// A net-new dependency with its type spelled as it will appear in code
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Injection {
    pub service_id: String,
    pub property: String,
    /// Type declaration, absent when untyped
    pub type_hint: Option<String>,
    /// Type for `@var` and `@param` tags
    pub doc_type: String,
    /// Lowercase description of the service
    pub label: String,
}

impl Injection {
    fn typed(&self, name: &str) -> String {
        match &self.type_hint {
            Some(hint) => format!("{} ${}", hint, name),
            None => format!("${}", name),
        }
    }
}

/// Builds edits against one analyzed class
pub(crate) struct SourceEditor<'a> {
    map: &'a SourceRegionMap,
    lines: &'a [&'a str],
    config: &'a InjectionConfig,
    member_indent: String,
    imports: Vec<String>,
    inline_body_opened: bool,
}

impl<'a> SourceEditor<'a> {
    pub fn new(map: &'a SourceRegionMap, lines: &'a [&'a str], config: &'a InjectionConfig) -> Self {
        let member_indent = if map.member_indent.is_empty() {
            config.indent.clone()
        } else {
            map.member_indent.clone()
        };

        Self {
            map,
            lines,
            config,
            member_indent,
            imports: Vec::new(),
            inline_body_opened: false,
        }
    }

    /// Spell out types, queueing the imports they need
    pub fn prepare(&mut self, planned: &[PlannedDependency]) -> Vec<Injection> {
        planned
            .iter()
            .map(|dependency| match &dependency.type_info {
                Some(info) => Injection {
                    service_id: dependency.service_id.clone(),
                    property: dependency.property.clone(),
                    type_hint: Some(self.type_reference(&info.fqn)),
                    doc_type: format!("\\{}", info.fqn),
                    label: info.label(),
                },
                None => Injection {
                    service_id: dependency.service_id.clone(),
                    property: dependency.property.clone(),
                    type_hint: None,
                    doc_type: "mixed".to_string(),
                    label: format!("'{}' service", dependency.service_id),
                },
            })
            .collect()
    }

    /// Name to write for a type, queueing an import when one is needed
    ///
    /// Falls back to the fully-qualified name when the short name is already
    /// taken by another import or by the class itself.
    pub fn type_reference(&mut self, fqn: &str) -> String {
        let info = AbstractionInfo::from_fqn(fqn, false);

        if let Some(import) = self
            .map
            .imports
            .statements
            .iter()
            .find(|import| import.fqn == info.fqn)
        {
            return import.alias.clone().unwrap_or(info.short_name);
        }

        let namespace = info.fqn.rsplit_once('\\').map(|(namespace, _)| namespace);
        if namespace == self.map.namespace.as_deref() {
            return info.short_name;
        }

        let taken = self.map.imports.statements.iter().any(|import| {
            let visible = import
                .alias
                .as_deref()
                .unwrap_or_else(|| import.fqn.rsplit('\\').next().unwrap_or(&import.fqn));
            visible.eq_ignore_ascii_case(&info.short_name)
        }) || self
            .map
            .class_declaration
            .as_ref()
            .is_some_and(|class| class.name.eq_ignore_ascii_case(&info.short_name))
            || self.imports.iter().any(|queued| {
                queued != &info.fqn
                    && queued
                        .rsplit('\\')
                        .next()
                        .is_some_and(|short| short.eq_ignore_ascii_case(&info.short_name))
            });
        if taken || namespace.is_none() {
            return format!("\\{}", info.fqn);
        }

        if !self.imports.contains(&info.fqn) {
            self.imports.push(info.fqn);
        }
        info.short_name
    }

    /// `use` insertions for every queued import
    pub fn import_edits(&self) -> Vec<RefactoringEdit> {
        let at = Position::line_start(self.map.imports.insertion_line);
        let standalone = self.map.imports.range.is_none();

        self.imports
            .iter()
            .enumerate()
            .map(|(index, fqn)| {
                let mut text = format!("use {};\n", fqn);
                if standalone && index + 1 == self.imports.len() {
                    text.push('\n');
                }
                RefactoringEdit::insert(EditKind::Import, format!("Import {}", fqn), at, text)
            })
            .collect()
    }

    /// Property declarations, one per injection
    pub fn property_edits(&mut self, injections: &[Injection]) -> Vec<RefactoringEdit> {
        injections
            .iter()
            .filter_map(|injection| {
                let indent = &self.member_indent;
                let mut text = String::new();
                if self.config.emit_docblocks {
                    text.push_str(&format!(
                        "{i}/**\n{i} * The {label}.\n{i} *\n{i} * @var {doc}\n{i} */\n",
                        i = indent,
                        label = injection.label,
                        doc = injection.doc_type,
                    ));
                }
                let declaration = match (&injection.type_hint, self.config.typed_properties) {
                    (Some(hint), true) => format!("{} ${}", hint, injection.property),
                    _ => format!("${}", injection.property),
                };
                text.push_str(&format!(
                    "{}{} {};\n\n",
                    indent,
                    self.config.property_visibility.keyword(),
                    declaration
                ));

                let (at, text) = self.member_insertion(text)?;
                Some(RefactoringEdit::insert(
                    EditKind::Property,
                    format!("Declare ${}", injection.property),
                    at,
                    text,
                ))
            })
            .collect()
    }

    /// Property declarations for dependencies passed through the constructor
    ///
    /// Promoted parameters declare their own properties.
    pub fn constructor_property_edits(&mut self, injections: &[Injection]) -> Vec<RefactoringEdit> {
        if self.config.promote_new_parameters {
            return Vec::new();
        }
        self.property_edits(injections)
    }

    /// Parameters and assignments appended to an existing constructor
    pub fn constructor_edits(
        &self,
        ctor: &MethodRegion,
        injections: &[Injection],
    ) -> Vec<RefactoringEdit> {
        let parameters: Vec<(String, String)> = injections
            .iter()
            .map(|injection| {
                (
                    format!("Add constructor parameter ${}", injection.property),
                    self.parameter_text(injection),
                )
            })
            .collect();

        let mut edits = append_to_list(
            self.lines,
            ctor.parameter_list,
            ctor.parameters.last().map(|param| param.range),
            ctor.trailing_comma,
            EditKind::ConstructorParameter,
            &parameters,
        );

        if !self.config.promote_new_parameters {
            edits.extend(self.assignment_edits(ctor, injections));
        }
        edits
    }

    fn assignment_edits(&self, ctor: &MethodRegion, injections: &[Injection]) -> Vec<RefactoringEdit> {
        let body = ctor.body;
        let signature_indent = self
            .lines
            .get(ctor.signature_line)
            .map_or("", |line| indentation(line));
        let statement_indent = (body.start.line + 1..body.end.line)
            .filter_map(|index| self.lines.get(index))
            .find(|line| !line.trim().is_empty())
            .map(|line| indentation(line).to_string())
            .unwrap_or_else(|| format!("{}{}", signature_indent, self.config.indent));

        let closer_on_own_line = body.end.line > body.start.line
            && self
                .lines
                .get(body.end.line)
                .and_then(|line| line.get(..body.end.character))
                .is_some_and(|prefix| prefix.trim().is_empty());

        if closer_on_own_line {
            return injections
                .iter()
                .map(|injection| {
                    RefactoringEdit::insert(
                        EditKind::ConstructorAssignment,
                        format!("Assign $this->{}", injection.property),
                        Position::line_start(body.end.line),
                        format!(
                            "{}$this->{p} = ${p};\n",
                            statement_indent,
                            p = injection.property
                        ),
                    )
                })
                .collect();
        }

        // Body closes on a line with other code, e.g. `) {}`
        let mut text = String::from("\n");
        for injection in injections {
            text.push_str(&format!(
                "{}$this->{p} = ${p};\n",
                statement_indent,
                p = injection.property
            ));
        }
        text.push_str(signature_indent);

        let names: Vec<String> = injections
            .iter()
            .map(|injection| format!("$this->{}", injection.property))
            .collect();
        vec![RefactoringEdit::insert(
            EditKind::ConstructorAssignment,
            format!("Assign {}", names.join(", ")),
            body.end,
            text,
        )]
    }

    /// A new constructor at the member insertion point
    ///
    /// `inherited` are parameters passed straight on to `parent::__construct`.
    pub fn synthesized_constructor(
        &mut self,
        inherited: &[String],
        injections: &[Injection],
    ) -> Option<RefactoringEdit> {
        let indent = self.member_indent.clone();
        let body_indent = format!("{}{}", indent, self.config.indent);
        let class_name = self.map.class_declaration.as_ref()?.name.clone();
        let mut text = String::new();

        if self.config.emit_docblocks {
            text.push_str(&format!(
                "{i}/**\n{i} * Constructs a new {name} object.\n{i} *\n",
                i = indent,
                name = class_name
            ));
            for (index, injection) in injections.iter().enumerate() {
                if index > 0 {
                    text.push_str(&format!("{} *\n", indent));
                }
                text.push_str(&format!(
                    "{i} * @param {doc} ${p}\n{i} *   The {label}.\n",
                    i = indent,
                    doc = injection.doc_type,
                    p = injection.property,
                    label = injection.label,
                ));
            }
            text.push_str(&format!("{} */\n", indent));
        }

        let parameters: Vec<String> = inherited
            .iter()
            .cloned()
            .chain(injections.iter().map(|injection| self.parameter_text(injection)))
            .collect();
        text.push_str(&format!(
            "{}public function __construct({}) {{\n",
            indent,
            parameters.join(", ")
        ));
        if !inherited.is_empty() {
            text.push_str(&format!(
                "{}parent::__construct({});\n",
                body_indent,
                inherited.join(", ")
            ));
        }
        if !self.config.promote_new_parameters {
            for injection in injections {
                text.push_str(&format!(
                    "{}$this->{p} = ${p};\n",
                    body_indent,
                    p = injection.property
                ));
            }
        }
        text.push_str(&format!("{}}}\n\n", indent));

        let (at, text) = self.member_insertion(text)?;
        Some(RefactoringEdit::insert(
            EditKind::Constructor,
            format!("Create constructor for {}", class_name),
            at,
            text,
        ))
    }

    /// Anchor for a new member block and the text adjusted for it
    ///
    /// Members go before the constructor docblock, else at the top of the
    /// class body after its opening blank line. A body opened and closed on
    /// one line is split first.
    pub fn member_insertion(&mut self, text: String) -> Option<(Position, String)> {
        let body = self.map.class_declaration.as_ref()?.body?;
        if body.start.line == body.end.line {
            let text = if self.inline_body_opened {
                text
            } else {
                self.inline_body_opened = true;
                format!("\n{}", text)
            };
            return Some((body.end, text));
        }

        let mut line = self.map.properties.insertion_line;
        let opening_blank = self.map.constructor.is_none()
            && line < body.end.line
            && self.lines.get(line).is_some_and(|content| content.trim().is_empty());
        if opening_blank {
            line += 1;
        }
        Some((Position::line_start(line), text))
    }

    pub fn member_indent(&self) -> &str {
        &self.member_indent
    }

    pub fn parameter_text(&self, injection: &Injection) -> String {
        let parameter = injection.typed(&injection.property);
        if self.config.promote_new_parameters {
            format!("{} {}", self.config.property_visibility.keyword(), parameter)
        } else {
            parameter
        }
    }
}
