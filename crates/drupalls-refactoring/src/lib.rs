//! DrupalLS Dependency-Injection Refactoring Engine
//!
//! Computes the minimal edits that inject new services into an existing PHP
//! class and, for container-built services, into the class's entry in the
//! module's `*.services.yml`.
//!
//! # Architecture
//!
//! - **Structural Analyzer**: recovers imports, properties, constructor and
//!   `create()` factory regions from raw source by string-aware brace counting
//! - **Capability Resolver**: maps service identifiers to the interface they
//!   should be injected as, using a read-only registry snapshot
//! - **Merge Strategies**: one per artifact kind (factory-instantiated plugins,
//!   forms and controllers; registry-instantiated services)
//! - **Edit Aggregator**: groups edits by file and rejects overlaps, so a
//!   change-set applies to both files or not at all
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use drupalls_refactoring::{
//!     compute_injection_edits, ArtifactKind, DependencyRequest, InjectionRequest,
//!     ModuleServicesLocator, RegistrySnapshot,
//! };
//!
//! let registry = RegistrySnapshot::from_yaml_str(&core_services)?;
//! let dependencies = [DependencyRequest::new("logger.factory")];
//! let request = InjectionRequest::new(
//!     Path::new("modules/example/src/ExampleService.php"),
//!     &source,
//!     &dependencies,
//!     ArtifactKind::RegistryInstantiated,
//! );
//!
//! let change_set = compute_injection_edits(request, &registry, &ModuleServicesLocator)?;
//! ```

pub mod aggregator;
pub mod analysis;
pub mod applier;
pub mod config;
pub mod error;
pub mod preview;
pub mod registry;
pub mod resolver;
pub mod strategies;
pub mod types;

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

pub use aggregator::EditAggregator;
pub use analysis::{SourceRegionMap, StructureAnalyzer};
pub use applier::apply_edits;
pub use config::{ConfigLoader, InjectionConfig, Visibility};
pub use error::{EngineNote, InjectionError, RegionKind, Result};
pub use preview::{ChangeSetPreview, FilePreview, PreviewGenerator};
pub use registry::{RegistrySnapshot, ServiceRecord};
pub use resolver::{
    property_name_for_service, AbstractionInfo, CapabilityResolver, TypeAnalyzer,
    UnavailableTypeAnalyzer,
};
pub use strategies::{
    CompanionFile, CompanionLocator, MergeStrategy, ModuleServicesLocator, NoCompanion,
    StrategyContext, StrategyOutput,
};
pub use types::{
    ArtifactKind, ChangeSet, CompanionStatus, DependencyRequest, EditKind, EditTarget, FileEdits,
    InjectionRequest, Position, RefactoringEdit, TextRange,
};

/// The main injection engine
pub struct InjectionEngine {
    config: InjectionConfig,
    analyzer: StructureAnalyzer,
    type_analyzer: Arc<dyn TypeAnalyzer>,
}

impl InjectionEngine {
    /// Create a new engine
    pub fn new(config: InjectionConfig) -> Self {
        Self {
            config,
            analyzer: StructureAnalyzer::new(),
            type_analyzer: Arc::new(UnavailableTypeAnalyzer),
        }
    }

    /// Consult an external type analyzer when resolving abstractions
    pub fn with_type_analyzer(mut self, type_analyzer: Arc<dyn TypeAnalyzer>) -> Self {
        self.type_analyzer = type_analyzer;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &InjectionConfig {
        &self.config
    }

    /// Recover the structural regions of a class
    pub fn analyze_structure(&self, source: &str) -> SourceRegionMap {
        self.analyzer.analyze(source)
    }

    /// Compute the change-set injecting the requested services
    ///
    /// Non-fatal conditions end up as notes on the change-set. The only error
    /// is an [`InjectionError::AggregationConflict`], in which case nothing
    /// should be applied.
    pub fn compute_injection_edits(
        &self,
        request: InjectionRequest<'_>,
        registry: &RegistrySnapshot,
        locator: &dyn CompanionLocator,
    ) -> Result<ChangeSet> {
        let id = Uuid::new_v4().to_string();
        info!(
            request_id = %id,
            path = %request.source_path.display(),
            kind = ?request.kind,
            dependencies = request.dependencies.len(),
            "Computing injection edits"
        );

        let map = self.analyzer.analyze(request.source);
        let lines: Vec<&str> = request.source.lines().collect();
        let resolver = CapabilityResolver::new(registry, self.type_analyzer.as_ref());
        let ctx = StrategyContext {
            request,
            map: &map,
            lines: &lines,
            resolver: &resolver,
            registry,
            locator,
            config: &self.config,
        };

        let output = MergeStrategy::for_kind(request.kind).compute(&ctx);
        let files = EditAggregator::aggregate(output.edits, request.source_path)?;

        let mut notes = map.notes.clone();
        notes.extend(output.notes);
        for note in &notes {
            debug!(request_id = %id, "{}", note);
        }

        let change_set = ChangeSet {
            id,
            files,
            companion: output.companion,
            notes,
        };
        info!(
            request_id = %change_set.id,
            edits = change_set.edit_count(),
            notes = change_set.notes.len(),
            "Computed injection edits"
        );
        Ok(change_set)
    }
}

impl Default for InjectionEngine {
    fn default() -> Self {
        Self::new(InjectionConfig::default())
    }
}

/// Compute injection edits with the default configuration
pub fn compute_injection_edits(
    request: InjectionRequest<'_>,
    registry: &RegistrySnapshot,
    locator: &dyn CompanionLocator,
) -> Result<ChangeSet> {
    InjectionEngine::default().compute_injection_edits(request, registry, locator)
}

/// Recover the structural regions of a class with the default analyzer
pub fn analyze_structure(source: &str) -> SourceRegionMap {
    analysis::analyze_structure(source)
}
