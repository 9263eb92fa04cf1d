//! Structural regions recovered from class source

use serde::{Deserialize, Serialize};

use crate::error::EngineNote;
use crate::types::TextRange;

/// Inclusive range of whole lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    /// First line (0-based)
    pub start: usize,
    /// Last line (0-based, inclusive)
    pub end: usize,
}

impl LineRange {
    /// Create a new line range
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether a line falls inside the range
    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }
}

/// A `use Foo\Bar;` statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatement {
    /// Imported fully-qualified name, without a leading backslash
    pub fqn: String,
    /// Alias given with `as`
    pub alias: Option<String>,
    /// Line of the statement
    pub line: usize,
}

/// Leading import block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportsBlock {
    /// Class imports in source order
    pub statements: Vec<ImportStatement>,
    /// Lines spanned by the block
    pub range: Option<LineRange>,
    /// Line before which new imports go
    pub insertion_line: usize,
}

/// Kind of type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    /// `class`
    Class,
    /// `interface`
    Interface,
    /// `trait`
    Trait,
}

/// The first type declaration in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    /// Declared name
    pub name: String,
    /// Declaration keyword
    pub kind: ClassKind,
    /// Line holding the keyword
    pub line: usize,
    /// First line of the declaration including docblock and attributes
    pub region_start: usize,
    /// Braces enclosing the body, absent when unbalanced
    pub body: Option<TextRange>,
}

/// A member property declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    /// Property name without `$`
    pub name: String,
    /// Declaration line
    pub line: usize,
}

/// Declared properties and where new ones go
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesBlock {
    /// Properties declared at class-body level
    pub properties: Vec<PropertyDeclaration>,
    /// Line before which new properties go
    pub insertion_line: usize,
}

/// One parameter of a method signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Raw parameter text as written
    pub raw: String,
    /// Variable name without `$`
    pub name: String,
    /// Declared type, if any
    pub type_hint: Option<String>,
    /// Whether the parameter declares a property (constructor promotion)
    pub promoted: bool,
    /// Whether callers may leave it out (default value or variadic)
    pub optional: bool,
    /// Location of the raw text
    pub range: TextRange,
}

/// A method signature plus its body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRegion {
    /// Method name
    pub name: String,
    /// Line holding the `function` keyword
    pub signature_line: usize,
    /// Docblock directly above the signature
    pub docblock: Option<LineRange>,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Parentheses enclosing the parameter list
    pub parameter_list: TextRange,
    /// Whether the last parameter is followed by a comma
    pub trailing_comma: bool,
    /// Braces enclosing the body
    pub body: TextRange,
}

impl MethodRegion {
    /// First line of the region, docblock included
    pub fn start_line(&self) -> usize {
        self.docblock
            .map(|doc| doc.start)
            .unwrap_or(self.signature_line)
    }

    /// Last line of the region
    pub fn end_line(&self) -> usize {
        self.body.end.line
    }

    /// Lines spanned by the body braces
    pub fn body_lines(&self) -> LineRange {
        LineRange::new(self.body.start.line, self.body.end.line)
    }

    /// Find a parameter by variable name
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|param| param.name == name)
    }
}

/// A `$container->get('id')` call found in the factory body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchCall {
    /// Requested service identifier
    pub service_id: String,
    /// Line of the call
    pub line: usize,
}

/// The `new static(...)` expression building the instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionCall {
    /// Class expression after `new`
    pub class_expr: String,
    /// Parentheses enclosing the arguments
    pub argument_list: TextRange,
    /// Argument texts in order
    pub arguments: Vec<String>,
    /// Location of the last argument
    pub last_argument: Option<TextRange>,
    /// Whether the last argument is followed by a comma
    pub trailing_comma: bool,
}

/// `$instance = parent::create(...)` followed by `return $instance;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAssignment {
    /// Variable holding the instance, without `$`
    pub variable: String,
    /// Line of the `return` statement
    pub return_line: usize,
}

/// Static `create()` factory method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryMethodRegion {
    /// Signature, parameters and body
    pub method: MethodRegion,
    /// Name of the container parameter, without `$`
    pub container_variable: String,
    /// Services already fetched from the container
    pub fetch_calls: Vec<FetchCall>,
    /// Construction call whose arguments mirror the constructor
    pub construction: Option<ConstructionCall>,
    /// Instance-style factory
    pub instance: Option<InstanceAssignment>,
}

/// Every region the analyzer could recover from one class file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRegionMap {
    /// Number of lines in the source
    pub line_count: usize,
    /// Whether the source ends with a newline
    pub trailing_newline: bool,
    /// Declared namespace
    pub namespace: Option<String>,
    /// Leading imports
    pub imports: ImportsBlock,
    /// First type declaration
    pub class_declaration: Option<ClassDeclaration>,
    /// Class-level property declarations
    pub properties: PropertiesBlock,
    /// `__construct`, when present and balanced
    pub constructor: Option<MethodRegion>,
    /// Static `create()`, when present and balanced
    pub factory_method: Option<FactoryMethodRegion>,
    /// Indentation of class members
    pub member_indent: String,
    /// Regions that could not be recovered
    pub notes: Vec<EngineNote>,
}

impl SourceRegionMap {
    /// Fully-qualified class name
    pub fn fqcn(&self) -> Option<String> {
        let class = self.class_declaration.as_ref()?;
        Some(match &self.namespace {
            Some(namespace) => format!("{}\\{}", namespace, class.name),
            None => class.name.clone(),
        })
    }

    /// Whether a fully-qualified name is imported verbatim
    pub fn is_imported(&self, fqn: &str) -> bool {
        let fqn = fqn.trim_start_matches('\\');
        self.imports.statements.iter().any(|import| import.fqn == fqn)
    }

    /// Whether the class body could be located
    pub fn has_class_body(&self) -> bool {
        self.class_declaration
            .as_ref()
            .is_some_and(|class| class.body.is_some())
    }

    /// Whether a property exists, either declared or promoted
    pub fn declares_property(&self, name: &str) -> bool {
        self.properties.properties.iter().any(|prop| prop.name == name)
            || self.constructor.as_ref().is_some_and(|ctor| {
                ctor.parameters
                    .iter()
                    .any(|param| param.promoted && param.name == name)
            })
    }

    /// Whether the factory already fetches a service
    pub fn fetches_service(&self, service_id: &str) -> bool {
        self.factory_method.as_ref().is_some_and(|factory| {
            factory
                .fetch_calls
                .iter()
                .any(|call| call.service_id == service_id)
        })
    }
}
