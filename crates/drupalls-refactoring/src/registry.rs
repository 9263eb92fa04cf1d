//! Read-only snapshot of the service container definitions

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{InjectionError, Result};

const MAX_ALIAS_DEPTH: usize = 8;

/// One service definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Service identifier
    pub id: String,
    /// Implementing class
    pub class: Option<String>,
    /// PHP file defining the class, when the index knows it
    pub source_path: Option<PathBuf>,
    /// Interface the service is exposed as
    pub abstraction: Option<String>,
    /// Constructor arguments as written
    pub arguments: Vec<String>,
}

impl ServiceRecord {
    /// Create a record for a service implemented by `class`
    pub fn new(id: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: Some(class.into()),
            ..Self::default()
        }
    }

    /// Attach the class file path
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Attach the interface the service is exposed as
    pub fn with_abstraction(mut self, fqn: impl Into<String>) -> Self {
        self.abstraction = Some(fqn.into());
        self
    }
}

/// Raw service definition as found under `services:`
#[derive(Debug, Default, Deserialize)]
struct ServiceDefinition {
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
}

/// Immutable view of every known service, passed into each request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    services: BTreeMap<String, ServiceRecord>,
    aliases: BTreeMap<String, String>,
}

impl RegistrySnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from one `*.services.yml` document
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let mut snapshot = Self::new();
        snapshot.load_yaml_str(text)?;
        Ok(snapshot)
    }

    /// Add the definitions of one `*.services.yml` document
    ///
    /// Interface aliases (`Drupal\Core\Foo\FooInterface: '@foo'`) become the
    /// abstraction of their target service.
    pub fn load_yaml_str(&mut self, text: &str) -> Result<()> {
        let document: Value = serde_yaml::from_str(text)?;
        let services = match document.get("services") {
            Some(Value::Mapping(services)) => services,
            Some(Value::Null) | None => return Ok(()),
            Some(_) => {
                return Err(InjectionError::RegistryError(
                    "'services' must be a mapping".to_string(),
                ))
            }
        };

        let mut interface_aliases = Vec::new();

        for (key, value) in services {
            let Some(id) = key.as_str() else {
                continue;
            };
            if id.starts_with('_') {
                // `_defaults` and similar
                continue;
            }

            match value {
                Value::String(target) => {
                    let target = target.trim_start_matches('@').to_string();
                    if looks_like_interface(id) {
                        interface_aliases.push((id.to_string(), target.clone()));
                    }
                    self.aliases.insert(id.to_string(), target);
                }
                Value::Mapping(_) => {
                    let definition: ServiceDefinition = serde_yaml::from_value(value.clone())?;
                    if let Some(target) = definition.alias {
                        let target = target.trim_start_matches('@').to_string();
                        if looks_like_interface(id) {
                            interface_aliases.push((id.to_string(), target.clone()));
                        }
                        self.aliases.insert(id.to_string(), target);
                        continue;
                    }
                    let class = definition.class.or_else(|| {
                        id.contains('\\').then(|| id.to_string())
                    });
                    let arguments = definition
                        .arguments
                        .iter()
                        .filter_map(|argument| argument.as_str().map(str::to_string))
                        .collect();
                    let record = self
                        .services
                        .entry(id.to_string())
                        .or_insert_with(|| ServiceRecord {
                            id: id.to_string(),
                            ..ServiceRecord::default()
                        });
                    record.class = class;
                    record.arguments = arguments;
                }
                Value::Null if id.contains('\\') => {
                    self.services.insert(id.to_string(), ServiceRecord::new(id, id));
                }
                _ => debug!("Skipping service definition '{}' of unsupported shape", id),
            }
        }

        for (interface, target) in interface_aliases {
            let target = self.canonical_id(&target).to_string();
            if let Some(record) = self.services.get_mut(&target) {
                record.abstraction.get_or_insert(interface);
            }
        }

        Ok(())
    }

    /// Insert or replace a record
    pub fn insert(&mut self, record: ServiceRecord) {
        self.services.insert(record.id.clone(), record);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_service(mut self, record: ServiceRecord) -> Self {
        self.insert(record);
        self
    }

    /// Register `alias` as another name for `target`
    pub fn insert_alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    /// Follow aliases to the defining identifier
    pub fn canonical_id<'a>(&'a self, id: &'a str) -> &'a str {
        let mut current = id;
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.aliases.get(current) {
                Some(target) => current = target.as_str(),
                None => break,
            }
        }
        current
    }

    /// Look up a service, following aliases
    pub fn get(&self, id: &str) -> Option<&ServiceRecord> {
        self.services.get(self.canonical_id(id))
    }

    /// Service whose class lives in `path`
    pub fn find_by_source_path(&self, path: &Path) -> Option<&ServiceRecord> {
        self.services
            .values()
            .find(|record| record.source_path.as_deref() == Some(path))
    }

    /// Service implemented by `fqcn`
    pub fn find_by_class(&self, fqcn: &str) -> Option<&ServiceRecord> {
        let fqcn = fqcn.trim_start_matches('\\');
        self.services.values().find(|record| {
            record
                .class
                .as_deref()
                .is_some_and(|class| class.trim_start_matches('\\') == fqcn)
        })
    }

    /// Number of services, aliases excluded
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the snapshot holds no services
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn looks_like_interface(id: &str) -> bool {
    id.contains('\\') && id.ends_with("Interface")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE_SERVICES: &str = r#"
parameters:
  session.storage.options: {}
services:
  _defaults:
    autoconfigure: true
  logger.factory:
    class: Drupal\Core\Logger\LoggerChannelFactory
    arguments: ['@request_stack', '@current_user']
  Drupal\Core\Logger\LoggerChannelFactoryInterface: '@logger.factory'
  entity_type.manager:
    class: Drupal\Core\Entity\EntityTypeManager
    arguments: ['@container.namespaces']
  Drupal\Core\Entity\EntityTypeManagerInterface:
    alias: entity_type.manager
  plugin.manager.entity: '@entity_type.manager'
  Drupal\example\Autowired: ~
"#;

    #[test]
    fn test_load_records_and_arguments() -> Result<()> {
        let snapshot = RegistrySnapshot::from_yaml_str(CORE_SERVICES)?;

        let logger = snapshot.get("logger.factory").expect("logger.factory");
        assert_eq!(
            logger.class.as_deref(),
            Some("Drupal\\Core\\Logger\\LoggerChannelFactory")
        );
        assert_eq!(logger.arguments, vec!["@request_stack", "@current_user"]);
        assert_eq!(snapshot.len(), 3);

        Ok(())
    }

    #[test]
    fn test_interface_aliases_become_abstractions() -> Result<()> {
        let snapshot = RegistrySnapshot::from_yaml_str(CORE_SERVICES)?;

        assert_eq!(
            snapshot
                .get("logger.factory")
                .and_then(|record| record.abstraction.as_deref()),
            Some("Drupal\\Core\\Logger\\LoggerChannelFactoryInterface")
        );
        assert_eq!(
            snapshot
                .get("entity_type.manager")
                .and_then(|record| record.abstraction.as_deref()),
            Some("Drupal\\Core\\Entity\\EntityTypeManagerInterface")
        );

        Ok(())
    }

    #[test]
    fn test_aliases_are_followed() -> Result<()> {
        let snapshot = RegistrySnapshot::from_yaml_str(CORE_SERVICES)?;

        assert_eq!(snapshot.canonical_id("plugin.manager.entity"), "entity_type.manager");
        assert!(snapshot.get("plugin.manager.entity").is_some());

        Ok(())
    }

    #[test]
    fn test_class_named_service() -> Result<()> {
        let snapshot = RegistrySnapshot::from_yaml_str(CORE_SERVICES)?;

        let record = snapshot
            .find_by_class("\\Drupal\\example\\Autowired")
            .expect("autowired service");
        assert_eq!(record.id, "Drupal\\example\\Autowired");

        Ok(())
    }

    #[test]
    fn test_find_by_source_path() {
        let snapshot = RegistrySnapshot::new().with_service(
            ServiceRecord::new("example.foo", "Drupal\\example\\Foo")
                .with_source_path("modules/example/src/Foo.php"),
        );

        let record = snapshot.find_by_source_path(Path::new("modules/example/src/Foo.php"));
        assert_eq!(record.map(|r| r.id.as_str()), Some("example.foo"));
        assert!(snapshot
            .find_by_source_path(Path::new("modules/example/src/Bar.php"))
            .is_none());
    }

    #[test]
    fn test_alias_cycle_terminates() {
        let mut snapshot = RegistrySnapshot::new();
        snapshot.insert_alias("a", "b");
        snapshot.insert_alias("b", "a");

        assert!(snapshot.get("a").is_none());
    }

    #[test]
    fn test_invalid_services_section() {
        let result = RegistrySnapshot::from_yaml_str("services: [1, 2]");
        assert!(matches!(result, Err(InjectionError::RegistryError(_))));
    }
}
