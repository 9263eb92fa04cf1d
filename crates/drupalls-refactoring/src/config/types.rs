//! Code generation options for injected dependencies

use serde::{Deserialize, Serialize};

use crate::error::{InjectionError, Result};

/// Visibility of generated properties and promoted parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// `public`
    Public,
    /// `protected`
    #[default]
    Protected,
    /// `private`
    Private,
}

impl Visibility {
    /// PHP keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

/// Options controlling the text of generated code
///
/// Defaults follow Drupal coding standards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// One level of indentation
    pub indent: String,
    /// Visibility of generated properties
    pub property_visibility: Visibility,
    /// Whether to emit docblocks above generated members
    pub emit_docblocks: bool,
    /// Whether generated properties carry a type declaration
    pub typed_properties: bool,
    /// Whether new constructor parameters are promoted instead of assigned
    pub promote_new_parameters: bool,
    /// Name of the container parameter in synthesized factories
    pub container_variable: String,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            property_visibility: Visibility::Protected,
            emit_docblocks: true,
            typed_properties: false,
            promote_new_parameters: false,
            container_variable: "container".to_string(),
        }
    }
}

impl InjectionConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.indent.is_empty() || !self.indent.chars().all(|c| c == ' ' || c == '\t') {
            return Err(InjectionError::InvalidConfiguration(
                "Indent must be a non-empty run of spaces or tabs".to_string(),
            ));
        }

        let variable = self.container_variable.as_str();
        let valid_variable = variable
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && variable.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_variable {
            return Err(InjectionError::InvalidConfiguration(format!(
                "'{}' is not a valid container variable name",
                variable
            )));
        }

        Ok(())
    }
}
