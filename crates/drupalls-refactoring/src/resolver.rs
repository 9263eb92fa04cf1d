//! Capability resolution: which type a service should be injected as

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::RegistrySnapshot;
use crate::types::DependencyRequest;

/// Type information for an injected service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractionInfo {
    /// Fully-qualified name without a leading backslash
    pub fqn: String,
    /// Unqualified class or interface name
    pub short_name: String,
    /// Suggested property and parameter name
    pub property_name: String,
    /// `use` statement importing the type
    pub import_statement: String,
    /// Whether the type is an interface rather than a concrete class
    pub is_interface: bool,
}

impl AbstractionInfo {
    /// Derive names from a fully-qualified type
    pub fn from_fqn(fqn: &str, is_interface: bool) -> Self {
        let fqn = fqn.trim_start_matches('\\');
        let short_name = fqn.rsplit('\\').next().unwrap_or(fqn).to_string();
        let base = short_name.strip_suffix("Interface").unwrap_or(&short_name);
        let base = if base.is_empty() { short_name.as_str() } else { base };

        Self {
            fqn: fqn.to_string(),
            property_name: lower_first(base),
            import_statement: format!("use {};", fqn),
            short_name,
            is_interface,
        }
    }

    /// Lowercase words of the short name, e.g. `logger channel factory`
    pub fn label(&self) -> String {
        let base = self
            .short_name
            .strip_suffix("Interface")
            .filter(|base| !base.is_empty())
            .unwrap_or(&self.short_name);
        split_camel_case(base).join(" ")
    }
}

/// Optional type analyzer consulted to enrich resolution
///
/// The language server may plug in an external analyzer that knows which
/// interfaces a class implements. Without one, resolution relies on the
/// registry snapshot alone.
pub trait TypeAnalyzer: Send + Sync {
    /// Whether the analyzer can answer queries
    fn is_available(&self) -> bool;

    /// Interface implemented by a concrete class that best describes it
    fn implemented_interface(&self, class_fqn: &str) -> Option<String>;
}

/// Type analyzer used when none is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableTypeAnalyzer;

impl TypeAnalyzer for UnavailableTypeAnalyzer {
    fn is_available(&self) -> bool {
        false
    }

    fn implemented_interface(&self, _class_fqn: &str) -> Option<String> {
        None
    }
}

/// Maps service identifiers to the types they should be injected as
pub struct CapabilityResolver<'a> {
    registry: &'a RegistrySnapshot,
    analyzer: &'a dyn TypeAnalyzer,
}

impl<'a> CapabilityResolver<'a> {
    /// Create a resolver over a registry snapshot
    pub fn new(registry: &'a RegistrySnapshot, analyzer: &'a dyn TypeAnalyzer) -> Self {
        Self { registry, analyzer }
    }

    /// Abstraction to inject a service as
    ///
    /// Absence is a normal outcome: callers fall back to the implementation
    /// or to an untyped parameter.
    pub fn resolve(&self, request: &DependencyRequest) -> Option<AbstractionInfo> {
        if let Some(fqn) = &request.type_override {
            let short = fqn.rsplit('\\').next().unwrap_or(fqn);
            return Some(AbstractionInfo::from_fqn(fqn, short.ends_with("Interface")));
        }

        let record = self.registry.get(&request.service_id)?;

        if let Some(abstraction) = &record.abstraction {
            return Some(AbstractionInfo::from_fqn(abstraction, true));
        }

        let class = record.class.as_deref()?;
        if class.ends_with("Interface") {
            return Some(AbstractionInfo::from_fqn(class, true));
        }

        if self.analyzer.is_available() {
            if let Some(interface) = self.analyzer.implemented_interface(class) {
                debug!(
                    "Type analyzer resolved '{}' to {}",
                    request.service_id, interface
                );
                return Some(AbstractionInfo::from_fqn(&interface, true));
            }
        }

        None
    }

    /// Concrete class implementing a service
    pub fn resolve_implementation(&self, service_id: &str) -> Option<AbstractionInfo> {
        let class = self.registry.get(service_id)?.class.as_deref()?;
        Some(AbstractionInfo::from_fqn(class, false))
    }
}

/// Property name derived from a service identifier
///
/// `entity_type.manager` becomes `entityTypeManager`.
pub fn property_name_for_service(service_id: &str) -> String {
    let mut name = String::new();
    let words = service_id
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty());

    for (index, word) in words.enumerate() {
        if index == 0 {
            name.push_str(&lower_first(word));
        } else {
            name.push_str(&upper_first(word));
        }
    }

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "service");
    }
    name
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn split_camel_case(name: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (index, &c) in chars.iter().enumerate() {
        let next_is_lower = chars.get(index + 1).is_some_and(|n| n.is_lowercase());
        let prev_is_lower = index > 0 && chars[index - 1].is_lowercase();
        if c.is_uppercase() && !current.is_empty() && (prev_is_lower || next_is_lower) {
            words.push(std::mem::take(&mut current));
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}
