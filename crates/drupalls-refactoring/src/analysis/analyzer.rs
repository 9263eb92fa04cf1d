//! Line-oriented structural analysis of PHP class source

use std::ops::ControlFlow;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::regions::{
    ClassDeclaration, ClassKind, ConstructionCall, FactoryMethodRegion, FetchCall,
    ImportStatement, ImportsBlock, InstanceAssignment, LineRange, MethodRegion, Parameter,
    PropertiesBlock, PropertyDeclaration, SourceRegionMap,
};
use super::scanner::{find_matching, indentation, split_list, Lexer, ScanFailure};
use crate::error::{EngineNote, RegionKind};
use crate::types::{Position, TextRange};

static NAMESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*namespace\s+([A-Za-z_][\w\\]*)\s*[;{]").expect("namespace regex")
});

static USE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*use\s+(function\s+|const\s+)?\\?([A-Za-z_][\w\\]*)(?:\s+as\s+(\w+))?\s*;")
        .expect("use regex")
});

static GROUP_USE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*use\s+(function\s+|const\s+)?\\?([A-Za-z_][\w\\]*?)\\?\{")
        .expect("group use regex")
});

static GROUP_MEMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(function\s+|const\s+)?([A-Za-z_][\w\\]*)(?:\s+as\s+(\w+))?$")
        .expect("group member regex")
});

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:final|abstract|readonly)\s+)*(class|interface|trait)\s+([A-Za-z_]\w*)")
        .expect("class regex")
});

static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*((?:(?:public|protected|private|static|final|abstract)\s+)*)function\s+&?([A-Za-z_]\w*)\s*\(",
    )
    .expect("method regex")
});

static PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|protected|private|var|static|readonly)\s+)+(?:\??[\w\\|]+\s+)?\$([A-Za-z_]\w*)",
    )
    .expect("property regex")
});

static PARAM_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\.\.\.)?&?\$([A-Za-z_]\w*)\s*(=|$)").expect("parameter name regex")
});

static PARAM_MODIFIERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((?:(?:public|protected|private|readonly)\s+)*)")
        .expect("parameter modifiers regex")
});

static FETCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\$(\w+)\s*->\s*get\(\s*['"]([^'"]+)['"]"#).expect("fetch regex")
});

static CONSTRUCT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bnew\s+(static|self|\\?[A-Za-z_][\w\\]*)\s*\(").expect("construct regex")
});

static INSTANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\$(\w+)\s*=\s*parent::create\s*\(").expect("instance regex")
});

static RETURN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*return\s+\$(\w+)\s*;").expect("return regex"));

/// Brace depth and lexical state at the start of a line
#[derive(Debug, Clone, Copy)]
struct LineProfile {
    depth: usize,
    in_code: bool,
}

/// A method signature found at class-body level
#[derive(Debug)]
struct MethodSignature<'a> {
    name: &'a str,
    modifiers: &'a str,
    line: usize,
    paren: usize,
}

/// Recovers a [`SourceRegionMap`] from class source without parsing it
///
/// The analyzer never fails: anything it cannot make sense of is left out of
/// the map and recorded as an [`EngineNote::AnalysisDegraded`].
#[derive(Debug, Clone, Default)]
pub struct StructureAnalyzer;

impl StructureAnalyzer {
    /// Create a new analyzer
    pub fn new() -> Self {
        Self
    }

    /// Analyze full source text
    pub fn analyze(&self, source: &str) -> SourceRegionMap {
        let lines: Vec<&str> = source.lines().collect();
        let mut map = self.analyze_lines(&lines);
        map.trailing_newline = source.is_empty() || source.ends_with('\n');
        map
    }

    /// Analyze source already split into lines
    pub fn analyze_lines(&self, lines: &[&str]) -> SourceRegionMap {
        let mut map = SourceRegionMap {
            line_count: lines.len(),
            trailing_newline: true,
            namespace: None,
            imports: ImportsBlock::default(),
            class_declaration: None,
            properties: PropertiesBlock::default(),
            constructor: None,
            factory_method: None,
            member_indent: String::new(),
            notes: Vec::new(),
        };

        let (profiles, unterminated) = profile_lines(lines);
        if unterminated {
            degrade(
                &mut map,
                RegionKind::ClassDeclaration,
                "source ends inside an unterminated string literal or comment",
            );
            return map;
        }

        map.namespace = lines
            .iter()
            .zip(&profiles)
            .filter(|(_, profile)| profile.in_code)
            .find_map(|(line, _)| NAMESPACE_RE.captures(line))
            .map(|caps| caps[1].to_string());

        let class = find_class(lines, &profiles);
        let import_limit = class
            .as_ref()
            .map(|class| class.region_start)
            .unwrap_or(lines.len());
        match find_imports(lines, &profiles, import_limit) {
            Ok(imports) => map.imports = imports,
            Err(reason) => {
                degrade(&mut map, RegionKind::Imports, &reason);
                return map;
            }
        }

        match &class {
            Some(class) if class.body.is_none() => degrade(
                &mut map,
                RegionKind::ClassDeclaration,
                "class body braces are unbalanced",
            ),
            Some(_) => {}
            None => degrade(
                &mut map,
                RegionKind::ClassDeclaration,
                "no class, interface or trait declaration found",
            ),
        }

        if map.imports.range.is_none() {
            map.imports.insertion_line = match (&class, &map.namespace) {
                (Some(class), _) => class.region_start,
                (None, Some(_)) => namespace_line(lines).map(|line| line + 1).unwrap_or(0),
                (None, None) => 0,
            };
        }

        let Some(class) = class else {
            return map;
        };
        let Some(body) = class.body else {
            map.class_declaration = Some(class);
            return map;
        };

        let member_depth = profiles[class.line].depth + 1;
        let mut methods = Vec::new();

        for index in body.start.line + 1..body.end.line {
            let profile = profiles[index];
            if profile.depth != member_depth || !profile.in_code {
                continue;
            }
            let line = lines[index];
            if map.member_indent.is_empty() && is_member_line(line) {
                map.member_indent = indentation(line).to_string();
            }
            if let Some(caps) = METHOD_RE.captures(line) {
                let (Some(whole), Some(modifiers), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
                else {
                    continue;
                };
                methods.push(MethodSignature {
                    name: name.as_str(),
                    modifiers: modifiers.as_str(),
                    line: index,
                    paren: whole.end() - 1,
                });
            } else if let Some(caps) = PROPERTY_RE.captures(line) {
                map.properties.properties.push(PropertyDeclaration {
                    name: caps[1].to_string(),
                    line: index,
                });
            }
        }

        let constructor_signature = methods
            .iter()
            .find(|method| method.name.eq_ignore_ascii_case("__construct"));
        map.properties.insertion_line = match constructor_signature {
            Some(signature) => leading_block_start(lines, signature.line),
            None => body.start.line + 1,
        };

        if let Some(signature) = constructor_signature {
            match extract_method(lines, signature) {
                Ok(region) => {
                    // Promoted parameters on their own lines look like declarations
                    let params = region.parameter_list;
                    map.properties
                        .properties
                        .retain(|prop| prop.line < params.start.line || prop.line > params.end.line);
                    map.constructor = Some(region);
                }
                Err(reason) => degrade(&mut map, RegionKind::Constructor, &reason),
            }
        }

        let factory_signature = methods.iter().find(|method| {
            method.name.eq_ignore_ascii_case("create") && method.modifiers.contains("static")
        });
        if let Some(signature) = factory_signature {
            match extract_method(lines, signature) {
                Ok(region) => map.factory_method = Some(extract_factory(lines, region)),
                Err(reason) => degrade(&mut map, RegionKind::FactoryMethod, &reason),
            }
        }

        debug!(
            class = %class.name,
            properties = map.properties.properties.len(),
            has_constructor = map.constructor.is_some(),
            has_factory = map.factory_method.is_some(),
            "Analyzed class structure"
        );

        map.class_declaration = Some(class);
        map
    }
}

/// Analyze source text with a default analyzer
pub fn analyze_structure(source: &str) -> SourceRegionMap {
    StructureAnalyzer::new().analyze(source)
}

fn degrade(map: &mut SourceRegionMap, region: RegionKind, reason: &str) {
    debug!("Analysis degraded for {:?}: {}", region, reason);
    map.notes.push(EngineNote::AnalysisDegraded {
        region,
        reason: reason.to_string(),
    });
}

fn profile_lines(lines: &[&str]) -> (Vec<LineProfile>, bool) {
    let mut lexer = Lexer::new();
    let mut depth = 0usize;
    let mut profiles = Vec::with_capacity(lines.len());

    for line in lines {
        profiles.push(LineProfile {
            depth,
            in_code: lexer.in_code(),
        });
        let _ = lexer.scan_line(line, 0, |_, byte| {
            match byte {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            ControlFlow::Continue(())
        });
    }

    (profiles, lexer.is_inside_literal())
}

fn namespace_line(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|line| NAMESPACE_RE.is_match(line))
}

fn find_class(lines: &[&str], profiles: &[LineProfile]) -> Option<ClassDeclaration> {
    let (line, caps) = lines
        .iter()
        .enumerate()
        .filter(|(index, _)| profiles[*index].in_code)
        .find_map(|(index, line)| CLASS_RE.captures(line).map(|caps| (index, caps)))?;

    let kind = match &caps[1] {
        "interface" => ClassKind::Interface,
        "trait" => ClassKind::Trait,
        _ => ClassKind::Class,
    };
    let name_end = caps.get(2).map(|name| name.end()).unwrap_or(0);
    let body = find_matching(lines, Position::new(line, name_end), b'{', b'}', Some(b';')).ok();

    Some(ClassDeclaration {
        name: caps[2].to_string(),
        kind,
        line,
        region_start: leading_block_start(lines, line),
        body,
    })
}

fn find_imports(
    lines: &[&str],
    profiles: &[LineProfile],
    limit: usize,
) -> Result<ImportsBlock, String> {
    let mut block = ImportsBlock::default();
    let mut first = None;
    let mut last = None;
    let mut index = 0;

    while index < limit {
        let line = lines[index];
        if !profiles[index].in_code {
            index += 1;
            continue;
        }

        if let Some(caps) = USE_RE.captures(line) {
            first.get_or_insert(index);
            last = Some(index);
            if caps.get(1).is_none() {
                block.statements.push(ImportStatement {
                    fqn: caps[2].to_string(),
                    alias: caps.get(3).map(|alias| alias.as_str().to_string()),
                    line: index,
                });
            }
        } else if let Some(caps) = GROUP_USE_RE.captures(line) {
            let open = caps.get(0).map_or(0, |m| m.end() - 1);
            let braces = find_matching(&lines[..limit], Position::new(index, open), b'{', b'}', None)
                .map_err(|_| format!("grouped import on line {} is not closed", index + 1))?;
            first.get_or_insert(index);
            last = Some(braces.end.line);

            let group_is_class = caps.get(1).is_none();
            let prefix = &caps[2];
            for item in split_list(lines, braces).items {
                let Some(member) = GROUP_MEMBER_RE.captures(&item.text) else {
                    return Err(format!("unrecognized grouped import '{}'", item.text));
                };
                if group_is_class && member.get(1).is_none() {
                    block.statements.push(ImportStatement {
                        fqn: format!("{}\\{}", prefix, &member[2]),
                        alias: member.get(3).map(|alias| alias.as_str().to_string()),
                        line: index,
                    });
                }
            }
            index = braces.end.line + 1;
            continue;
        } else if first.is_some() && !is_blank_or_comment(line) {
            break;
        }
        index += 1;
    }

    if let (Some(first), Some(last)) = (first, last) {
        block.range = Some(LineRange::new(first, last));
        block.insertion_line = last + 1;
    }

    Ok(block)
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with("//")
        || trimmed.starts_with('#') && !trimmed.starts_with("#[")
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
}

fn is_member_line(line: &str) -> bool {
    !is_blank_or_comment(line) && !line.trim_start().starts_with('}')
}

/// First line of the docblock and attributes attached to `line`
fn leading_block_start(lines: &[&str], line: usize) -> usize {
    let mut cursor = skip_attributes(lines, line);
    if let Some(doc) = docblock_ending_before(lines, cursor) {
        cursor = doc.start;
    }
    cursor
}

fn skip_attributes(lines: &[&str], line: usize) -> usize {
    let mut cursor = line;
    while cursor > 0 && lines[cursor - 1].trim_start().starts_with("#[") {
        cursor -= 1;
    }
    cursor
}

/// A `/** ... */` block whose last line is directly above `line`
fn docblock_ending_before(lines: &[&str], line: usize) -> Option<LineRange> {
    if line == 0 || !lines[line - 1].trim_end().ends_with("*/") {
        return None;
    }

    let end = line - 1;
    let mut start = end;
    loop {
        let trimmed = lines[start].trim_start();
        if trimmed.starts_with("/**") {
            return Some(LineRange::new(start, end));
        }
        if trimmed.starts_with("/*") || start == 0 {
            return None;
        }
        start -= 1;
    }
}

fn describe(failure: ScanFailure, what: &str) -> String {
    match failure {
        ScanFailure::Unterminated => format!("{} runs into an unterminated literal", what),
        ScanFailure::Unbalanced => format!("{} is unbalanced", what),
        ScanFailure::Stopped => format!("{} is missing", what),
    }
}

fn extract_method(lines: &[&str], signature: &MethodSignature<'_>) -> Result<MethodRegion, String> {
    let parameter_list = find_matching(
        lines,
        Position::new(signature.line, signature.paren),
        b'(',
        b')',
        None,
    )
    .map_err(|failure| describe(failure, "parameter list"))?;

    let list = split_list(lines, parameter_list);
    let parameters = list
        .items
        .iter()
        .map(|item| {
            parse_parameter(&item.text, item.range)
                .ok_or_else(|| format!("unrecognized parameter '{}'", item.text))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let body = find_matching(lines, parameter_list.end, b'{', b'}', Some(b';'))
        .map_err(|failure| describe(failure, "method body"))?;

    Ok(MethodRegion {
        name: signature.name.to_string(),
        signature_line: signature.line,
        docblock: docblock_ending_before(lines, skip_attributes(lines, signature.line)),
        parameters,
        parameter_list,
        trailing_comma: list.trailing_comma,
        body,
    })
}

fn parse_parameter(raw: &str, range: TextRange) -> Option<Parameter> {
    let attributes_end = attributes_end(raw)?;
    let rest = &raw[attributes_end..];
    let modifiers = PARAM_MODIFIERS_RE.captures(rest)?;
    let prefix_end = modifiers.get(0).map_or(0, |m| m.end());
    let promoted = modifiers
        .get(1)
        .is_some_and(|m| !m.as_str().trim().is_empty());

    let declaration = &rest[prefix_end..];
    let name_caps = PARAM_NAME_RE.captures(declaration)?;
    let name_match = name_caps.get(0)?;
    let optional = name_caps.get(1).is_some()
        || name_caps.get(3).is_some_and(|m| m.as_str() == "=");

    let type_hint = declaration
        .get(..name_match.start())
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .map(str::to_string);

    Some(Parameter {
        raw: raw.to_string(),
        name: name_caps[2].to_string(),
        type_hint,
        promoted,
        optional,
        range,
    })
}

/// Byte offset just past the `#[...]` attributes opening a parameter
///
/// Attribute arguments may nest brackets and hold strings, so each
/// attribute is closed by bracket matching.
fn attributes_end(raw: &str) -> Option<usize> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let mut offset = 0;

    loop {
        let rest = &raw[offset..];
        let trimmed = rest.trim_start();
        if !trimmed.starts_with("#[") {
            return Some(offset);
        }

        let open = offset + (rest.len() - trimmed.len()) + 1;
        let brackets = find_matching(&lines, position_in(&lines, open), b'[', b']', None).ok()?;
        offset = offset_in(&lines, brackets.end) + 1;
    }
}

/// Position of a byte offset in text split on `\n`
fn position_in(lines: &[&str], offset: usize) -> Position {
    let mut line_start = 0;
    for (index, line) in lines.iter().enumerate() {
        if offset <= line_start + line.len() {
            return Position::new(index, offset - line_start);
        }
        line_start += line.len() + 1;
    }
    Position::new(lines.len().saturating_sub(1), 0)
}

/// Byte offset of a position in text split on `\n`
fn offset_in(lines: &[&str], position: Position) -> usize {
    lines
        .iter()
        .take(position.line)
        .map(|line| line.len() + 1)
        .sum::<usize>()
        + position.character
}

fn extract_factory(lines: &[&str], method: MethodRegion) -> FactoryMethodRegion {
    let container_variable = method
        .parameters
        .first()
        .map(|param| param.name.clone())
        .unwrap_or_else(|| "container".to_string());

    let body_lines = method.body_lines();
    let mut fetch_calls = Vec::new();
    let mut construction = None;
    let mut instance_variable = None;
    let mut instance = None;

    for index in body_lines.start..=body_lines.end {
        let line = lines[index];
        if is_blank_or_comment(line) {
            continue;
        }

        for caps in FETCH_RE.captures_iter(line) {
            if caps[1] == container_variable {
                fetch_calls.push(FetchCall {
                    service_id: caps[2].to_string(),
                    line: index,
                });
            }
        }

        if construction.is_none() {
            if let Some(caps) = CONSTRUCT_RE.captures(line) {
                let paren = caps.get(0).map(|m| m.end() - 1).unwrap_or(0);
                construction = construction_call(lines, index, paren, &caps[1]);
            }
        }

        if let Some(caps) = INSTANCE_RE.captures(line) {
            instance_variable = Some(caps[1].to_string());
        } else if let (Some(variable), Some(caps)) = (&instance_variable, RETURN_RE.captures(line)) {
            if caps[1] == *variable {
                instance = Some(InstanceAssignment {
                    variable: variable.clone(),
                    return_line: index,
                });
            }
        }
    }

    FactoryMethodRegion {
        method,
        container_variable,
        fetch_calls,
        construction,
        instance,
    }
}

fn construction_call(
    lines: &[&str],
    line: usize,
    paren: usize,
    class_expr: &str,
) -> Option<ConstructionCall> {
    let argument_list = find_matching(lines, Position::new(line, paren), b'(', b')', None).ok()?;
    let list = split_list(lines, argument_list);

    Some(ConstructionCall {
        class_expr: class_expr.to_string(),
        argument_list,
        last_argument: list.items.last().map(|item| item.range),
        arguments: list.items.into_iter().map(|item| item.text).collect(),
        trailing_comma: list.trailing_comma,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLUGIN: &str = r#"<?php

namespace Drupal\example\Plugin\Block;

use Drupal\Core\Block\BlockBase;
use Drupal\Core\Plugin\ContainerFactoryPluginInterface;
use Symfony\Component\DependencyInjection\ContainerInterface;

/**
 * Provides an example block.
 */
#[Block(id: "example")]
class ExampleBlock extends BlockBase implements ContainerFactoryPluginInterface {

  /**
   * The foo service.
   *
   * @var \Drupal\example\Foo
   */
  protected $foo;

  /**
   * Constructs an ExampleBlock.
   */
  public function __construct(array $configuration, $plugin_id, $plugin_definition, Foo $foo) {
    parent::__construct($configuration, $plugin_id, $plugin_definition);
    $this->foo = $foo;
  }

  /**
   * {@inheritdoc}
   */
  public static function create(ContainerInterface $container, array $configuration, $plugin_id, $plugin_definition) {
    return new static(
      $configuration,
      $plugin_id,
      $plugin_definition,
      $container->get('example.foo')
    );
  }

  public function build() {
    return ['#markup' => '{not a brace}'];
  }

}
"#;

    #[test]
    fn test_imports_and_namespace() {
        let map = analyze_structure(PLUGIN);

        assert_eq!(map.namespace.as_deref(), Some("Drupal\\example\\Plugin\\Block"));
        assert_eq!(map.imports.statements.len(), 3);
        assert_eq!(map.imports.range, Some(LineRange::new(4, 6)));
        assert_eq!(map.imports.insertion_line, 7);
        assert!(map.is_imported("Drupal\\Core\\Block\\BlockBase"));
        assert!(map.is_imported("\\Drupal\\Core\\Block\\BlockBase"));
        assert!(!map.is_imported("Drupal\\Core\\Block"));
    }

    #[test]
    fn test_class_declaration_includes_docblock_and_attribute() {
        let map = analyze_structure(PLUGIN);
        let class = map.class_declaration.as_ref().expect("class");

        assert_eq!(class.name, "ExampleBlock");
        assert_eq!(class.kind, ClassKind::Class);
        assert_eq!(class.line, 12);
        assert_eq!(class.region_start, 8);
        assert_eq!(
            map.fqcn().as_deref(),
            Some("Drupal\\example\\Plugin\\Block\\ExampleBlock")
        );
    }

    #[test]
    fn test_properties_and_insertion_point() {
        let map = analyze_structure(PLUGIN);

        let names: Vec<&str> = map
            .properties
            .properties
            .iter()
            .map(|prop| prop.name.as_str())
            .collect();
        assert_eq!(names, vec!["foo"]);
        // Before the constructor docblock
        assert_eq!(map.properties.insertion_line, 21);
        assert_eq!(map.member_indent, "  ");
    }

    #[test]
    fn test_constructor_region() {
        let map = analyze_structure(PLUGIN);
        let ctor = map.constructor.as_ref().expect("constructor");

        assert_eq!(ctor.signature_line, 24);
        assert_eq!(ctor.docblock, Some(LineRange::new(21, 23)));
        assert_eq!(ctor.parameters.len(), 4);
        assert_eq!(ctor.parameters[3].raw, "Foo $foo");
        assert_eq!(ctor.parameters[3].type_hint.as_deref(), Some("Foo"));
        assert!(!ctor.parameters[3].promoted);
        assert_eq!(ctor.body_lines(), LineRange::new(24, 27));
    }

    #[test]
    fn test_factory_region() {
        let map = analyze_structure(PLUGIN);
        let factory = map.factory_method.as_ref().expect("factory");

        assert_eq!(factory.container_variable, "container");
        assert_eq!(factory.fetch_calls.len(), 1);
        assert_eq!(factory.fetch_calls[0].service_id, "example.foo");
        assert!(map.fetches_service("example.foo"));

        let call = factory.construction.as_ref().expect("construction call");
        assert_eq!(call.class_expr, "static");
        assert_eq!(call.arguments.len(), 4);
        assert!(!call.trailing_comma);
        assert!(factory.instance.is_none());
    }

    #[test]
    fn test_regions_are_ordered_and_disjoint() {
        let map = analyze_structure(PLUGIN);
        let ctor = map.constructor.as_ref().expect("constructor");
        let factory = map.factory_method.as_ref().expect("factory");
        let class = map.class_declaration.as_ref().expect("class");

        assert!(map.imports.range.expect("imports").end < class.region_start);
        assert!(ctor.end_line() < factory.method.start_line());
        assert!(factory.method.end_line() < class.body.expect("body").end.line);
    }

    #[test]
    fn test_promoted_parameters() {
        let source = "<?php\nclass A {\n  public function __construct(\n    private readonly Foo $foo,\n    #[Autowire(service: 'x')] protected Bar $bar,\n    #[Autowire(service: ['a'])] #[Other('[')] private Qux $qux,\n    ?Baz $baz = NULL,\n    string ...$rest,\n  ) {}\n}\n";
        let map = analyze_structure(source);
        let ctor = map.constructor.as_ref().expect("constructor");

        assert_eq!(ctor.parameters.len(), 5);
        assert!(ctor.parameters[0].promoted);
        assert!(ctor.parameters[1].promoted);
        assert_eq!(ctor.parameters[1].type_hint.as_deref(), Some("Bar"));
        assert!(ctor.parameters[2].promoted);
        assert_eq!(ctor.parameters[2].name, "qux");
        assert_eq!(ctor.parameters[2].type_hint.as_deref(), Some("Qux"));
        assert!(!ctor.parameters[3].promoted);
        assert_eq!(ctor.parameters[3].type_hint.as_deref(), Some("?Baz"));
        assert_eq!(ctor.parameters[4].name, "rest");
        assert!(ctor.trailing_comma);
        assert!(map.declares_property("foo"));
        assert!(map.declares_property("qux"));
        assert!(!map.declares_property("baz"));

        let optional: Vec<bool> = ctor.parameters.iter().map(|param| param.optional).collect();
        assert_eq!(optional, vec![false, false, false, true, true]);
    }

    #[test]
    fn test_instance_style_factory() {
        let source = "<?php\nclass F extends FormBase {\n  public static function create(ContainerInterface $container) {\n    $instance = parent::create($container);\n    $instance->foo = $container->get('foo');\n    return $instance;\n  }\n}\n";
        let map = analyze_structure(source);
        let factory = map.factory_method.as_ref().expect("factory");

        assert!(factory.construction.is_none());
        let instance = factory.instance.as_ref().expect("instance style");
        assert_eq!(instance.variable, "instance");
        assert_eq!(instance.return_line, 5);
        assert!(map.fetches_service("foo"));
    }

    #[test]
    fn test_no_class_degrades() {
        let map = analyze_structure("<?php\n\nfunction helper() {}\n");

        assert!(map.class_declaration.is_none());
        assert!(map.constructor.is_none());
        assert!(matches!(
            map.notes.as_slice(),
            [EngineNote::AnalysisDegraded {
                region: RegionKind::ClassDeclaration,
                ..
            }]
        ));
    }

    #[test]
    fn test_unterminated_string_degrades() {
        let map = analyze_structure("<?php\nclass A {\n  public function __construct() {\n    $a = 'open;\n  }\n}\n");

        assert!(map.class_declaration.is_none());
        assert!(map.constructor.is_none());
        assert_eq!(map.notes.len(), 1);
    }

    #[test]
    fn test_brace_in_string_does_not_shift_body_end() {
        let source = "<?php\nclass A {\n  public function __construct() {\n    $a = '}';\n    $b = \"{\";\n  }\n\n  public function other() {}\n}\n";
        let map = analyze_structure(source);
        let ctor = map.constructor.as_ref().expect("constructor");

        assert_eq!(ctor.body_lines(), LineRange::new(2, 5));
    }

    #[test]
    fn test_heredoc_braces_do_not_shift_body_end() {
        let source = "<?php\nclass A {\n  public function __construct() {\n    $t = <<<EOT\n}\n    EOT;\n    $s = <<<'SQL'\n    { }\n    SQL;\n    $this->x = 1;\n  }\n\n  public function other() {}\n}\n";
        let map = analyze_structure(source);
        let ctor = map.constructor.as_ref().expect("constructor");

        assert!(map.notes.is_empty());
        assert_eq!(ctor.body_lines(), LineRange::new(2, 10));
    }

    #[test]
    fn test_unterminated_heredoc_degrades() {
        let source = "<?php\nclass A {\n  public function __construct() {\n    $t = <<<EOT\n  }\n}\n";
        let map = analyze_structure(source);

        assert!(map.class_declaration.is_none());
        assert_eq!(map.notes.len(), 1);
    }

    #[test]
    fn test_grouped_imports_are_expanded() {
        let source = "<?php\n\nnamespace Drupal\\x;\n\nuse Drupal\\Core\\{Entity\\EntityTypeManagerInterface, Session\\AccountInterface as Account};\nuse Symfony\\Component\\DependencyInjection\\{\n  ContainerInterface,\n  function helper,\n};\nuse Drupal\\Core\\Messenger\\MessengerInterface;\n\nclass A {\n}\n";
        let map = analyze_structure(source);

        assert!(map.notes.is_empty());
        assert_eq!(map.imports.range, Some(LineRange::new(4, 9)));
        assert_eq!(map.imports.insertion_line, 10);
        assert!(map.is_imported("Drupal\\Core\\Entity\\EntityTypeManagerInterface"));
        assert!(map.is_imported("Symfony\\Component\\DependencyInjection\\ContainerInterface"));
        assert!(map.is_imported("Drupal\\Core\\Messenger\\MessengerInterface"));
        assert!(!map.is_imported("Symfony\\Component\\DependencyInjection\\helper"));

        let account = map
            .imports
            .statements
            .iter()
            .find(|import| import.fqn == "Drupal\\Core\\Session\\AccountInterface")
            .expect("aliased member");
        assert_eq!(account.alias.as_deref(), Some("Account"));
    }

    #[test]
    fn test_unclosed_grouped_import_degrades() {
        let source = "<?php\n\nuse Drupal\\Core\\{Foo, Bar;\n\nclass A {\n}\n";
        let map = analyze_structure(source);

        assert!(map.class_declaration.is_none());
        assert!(matches!(
            map.notes.as_slice(),
            [EngineNote::AnalysisDegraded {
                region: RegionKind::Imports,
                ..
            }]
        ));
    }

    #[test]
    fn test_no_constructor_insertion_at_top_of_body() {
        let source = "<?php\n\nnamespace Drupal\\x;\n\nclass A {\n\n  public function run() {}\n\n}\n";
        let map = analyze_structure(source);

        assert!(map.constructor.is_none());
        assert_eq!(map.properties.insertion_line, 5);
        assert_eq!(map.imports.range, None);
        assert_eq!(map.imports.insertion_line, 4);
    }
}
