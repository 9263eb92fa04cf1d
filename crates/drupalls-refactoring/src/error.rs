//! Error types for the injection engine

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TextRange;

/// Result type for injection operations
pub type Result<T> = std::result::Result<T, InjectionError>;

/// Errors that abort an injection request
///
/// Conditions that only shape the output (a missing region, an unresolved
/// service, a missing companion entry) are reported as [`EngineNote`]s on the
/// change-set instead.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// Two edits computed for the same file overlap
    #[error("Overlapping edits in {file}: {first} conflicts with {second}")]
    AggregationConflict {
        /// File the conflicting edits target
        file: String,
        /// Range of the earlier edit
        first: TextRange,
        /// Range of the later edit
        second: TextRange,
    },

    /// An edit could not be applied to the given text
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Registry snapshot could not be built
    #[error("Registry error: {0}")]
    RegistryError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Structural region named in degraded-analysis notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    /// Leading `use` statements
    Imports,
    /// Class, interface or trait declaration
    ClassDeclaration,
    /// `__construct` method
    Constructor,
    /// Static `create` factory method
    FactoryMethod,
}

/// Non-fatal condition encountered while computing edits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineNote {
    /// A region could not be analyzed and was synthesized or skipped
    AnalysisDegraded {
        /// The affected region
        region: RegionKind,
        /// Why the region was unusable
        reason: String,
    },
    /// No abstraction was found for a service identifier
    ResolutionMiss {
        /// The service identifier
        service_id: String,
    },
    /// No companion service definition matched the analyzed class
    CompanionNotFound {
        /// The companion file searched, if one was located
        path: Option<PathBuf>,
    },
}

impl std::fmt::Display for EngineNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineNote::AnalysisDegraded { region, reason } => {
                write!(f, "Analysis degraded for {:?}: {}", region, reason)
            }
            EngineNote::ResolutionMiss { service_id } => {
                write!(f, "No abstraction resolved for '{}'", service_id)
            }
            EngineNote::CompanionNotFound { path: Some(path) } => {
                write!(f, "No service definition found in {}", path.display())
            }
            EngineNote::CompanionNotFound { path: None } => {
                write!(f, "No companion service file located")
            }
        }
    }
}
