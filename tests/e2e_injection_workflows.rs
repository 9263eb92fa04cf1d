//! End-to-End Test Suite: Dependency Injection Workflows
//!
//! Drives the engine the way the language server does: a module on disk, a
//! registry built from core service definitions, configuration loaded from a
//! file, then preview, write-back and a second request that must be a no-op.

use std::path::{Path, PathBuf};

use drupalls_refactoring::{
    ArtifactKind, CompanionFile, CompanionStatus, ConfigLoader, DependencyRequest, EditKind,
    InjectionEngine, InjectionRequest, ModuleServicesLocator, PreviewGenerator, RegistrySnapshot,
    Visibility,
};
use tempfile::TempDir;

const CORE_SERVICES: &str = r#"parameters:
  session.storage.options: {}
services:
  _defaults:
    autowire: true
  logger.factory:
    class: Drupal\Core\Logger\LoggerChannelFactory
  Drupal\Core\Logger\LoggerChannelFactoryInterface: '@logger.factory'
  entity_type.manager:
    class: Drupal\Core\Entity\EntityTypeManager
  Drupal\Core\Entity\EntityTypeManagerInterface: '@entity_type.manager'
  plugin.manager.entity_type:
    alias: entity_type.manager
"#;

const MODULE_SERVICES: &str = r#"services:
  # Sends notifications.
  example.notifier:
    class: Drupal\example\ExampleNotifier
    arguments:
      - '@entity_type.manager'
    tags:
      - { name: event_subscriber }
"#;

const NOTIFIER: &str = r#"<?php

namespace Drupal\example;

use Drupal\Core\Entity\EntityTypeManagerInterface;

/**
 * Sends notifications.
 */
class ExampleNotifier {

  /**
   * The entity type manager.
   *
   * @var \Drupal\Core\Entity\EntityTypeManagerInterface
   */
  protected $entityTypeManager;

  /**
   * Constructs a new ExampleNotifier object.
   */
  public function __construct(EntityTypeManagerInterface $entity_type_manager) {
    $this->entityTypeManager = $entity_type_manager;
  }

}
"#;

/// A module laid out the way Drupal expects it
struct TestModule {
    _dir: TempDir,
    source_path: PathBuf,
    services_path: PathBuf,
}

fn create_module() -> TestModule {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let module = dir.path().join("modules/example");
    std::fs::create_dir_all(module.join("src")).expect("Failed to create module");
    std::fs::write(module.join("example.info.yml"), "name: Example\ntype: module\n")
        .expect("Failed to write info file");

    let services_path = module.join("example.services.yml");
    std::fs::write(&services_path, MODULE_SERVICES).expect("Failed to write services file");
    let source_path = module.join("src/ExampleNotifier.php");
    std::fs::write(&source_path, NOTIFIER).expect("Failed to write class file");

    TestModule {
        _dir: dir,
        source_path,
        services_path,
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("Failed to read file")
}

/// Complete workflow: compute, preview, write back, and confirm a rerun is a no-op.
#[test]
fn test_complete_service_injection_workflow() {
    let module = create_module();
    let registry = RegistrySnapshot::from_yaml_str(CORE_SERVICES).expect("registry");
    let engine = InjectionEngine::default();
    let dependencies = [DependencyRequest::new("logger.factory")];

    let source = read(&module.source_path);
    let request = InjectionRequest::new(
        &module.source_path,
        &source,
        &dependencies,
        ArtifactKind::RegistryInstantiated,
    );
    let change_set = engine
        .compute_injection_edits(request, &registry, &ModuleServicesLocator)
        .expect("Injection should succeed");

    assert_eq!(
        change_set.companion,
        CompanionStatus::Updated {
            path: module.services_path.clone()
        }
    );
    assert_eq!(change_set.source_edits_of(EditKind::ConstructorParameter).len(), 1);
    assert_eq!(change_set.source_edits_of(EditKind::ConstructorAssignment).len(), 1);

    // Preview both files without touching disk
    let companion = CompanionFile::new(module.services_path.clone(), read(&module.services_path));
    let preview = PreviewGenerator::new()
        .preview(&change_set, &module.source_path, &source, Some(&companion))
        .expect("Preview should succeed");
    assert_eq!(preview.files.len(), 2);
    // Only the constructor signature line is rewritten
    assert_eq!(preview.files[0].deletions, 1);
    assert_eq!(preview.files[1].deletions, 0);
    assert_eq!(preview.files[1].additions, 1);
    let diff = preview.unified_diff();
    assert!(diff.contains("+use Drupal\\Core\\Logger\\LoggerChannelFactoryInterface;"));
    assert!(diff.contains("+      - '@logger.factory'"));

    let updated_source = &preview.files[0].updated;
    assert!(updated_source.contains(
        "public function __construct(EntityTypeManagerInterface $entity_type_manager, LoggerChannelFactoryInterface $loggerChannelFactory) {"
    ));
    let updated_services = &preview.files[1].updated;
    assert!(updated_services.contains(
        "    arguments:\n      - '@entity_type.manager'\n      - '@logger.factory'\n    tags:"
    ));

    // Write back and run the same request again
    std::fs::write(&module.source_path, updated_source).expect("Failed to write class file");
    std::fs::write(&module.services_path, updated_services).expect("Failed to write services");

    let source = read(&module.source_path);
    let request = InjectionRequest::new(
        &module.source_path,
        &source,
        &dependencies,
        ArtifactKind::RegistryInstantiated,
    );
    let rerun = engine
        .compute_injection_edits(request, &registry, &ModuleServicesLocator)
        .expect("Injection should succeed");
    assert!(rerun.is_empty(), "Second run should not change anything");
    assert_eq!(
        rerun.companion,
        CompanionStatus::Unchanged {
            path: module.services_path.clone()
        }
    );
}

/// Aliased service ids resolve through the registry to the same abstraction.
#[test]
fn test_aliased_service_is_already_injected() {
    let module = create_module();
    let registry = RegistrySnapshot::from_yaml_str(CORE_SERVICES).expect("registry");
    let dependencies = [DependencyRequest::new("plugin.manager.entity_type")];
    let source = read(&module.source_path);
    let request = InjectionRequest::new(
        &module.source_path,
        &source,
        &dependencies,
        ArtifactKind::RegistryInstantiated,
    );

    let change_set = InjectionEngine::default()
        .compute_injection_edits(request, &registry, &ModuleServicesLocator)
        .expect("Injection should succeed");

    assert!(change_set.is_empty());
}

/// Configuration loaded from disk changes the generated code.
#[test]
fn test_configuration_file_drives_generation() {
    let module = create_module();
    let config_path = module.source_path.with_file_name("drupalls.yaml");
    std::fs::write(
        &config_path,
        "property_visibility: private\npromote_new_parameters: true\n",
    )
    .expect("Failed to write config");

    let config = ConfigLoader::load(&config_path).expect("Config should load");
    assert_eq!(config.property_visibility, Visibility::Private);
    assert_eq!(config.indent, "  ");

    let registry = RegistrySnapshot::from_yaml_str(CORE_SERVICES).expect("registry");
    let dependencies = [DependencyRequest::new("logger.factory")];
    let source = read(&module.source_path);
    let request = InjectionRequest::new(
        &module.source_path,
        &source,
        &dependencies,
        ArtifactKind::RegistryInstantiated,
    );
    let change_set = InjectionEngine::new(config)
        .compute_injection_edits(request, &registry, &ModuleServicesLocator)
        .expect("Injection should succeed");

    let parameters = change_set.source_edits_of(EditKind::ConstructorParameter);
    assert_eq!(parameters.len(), 1);
    assert_eq!(
        parameters[0].new_text,
        ", private LoggerChannelFactoryInterface $loggerChannelFactory"
    );
    assert!(change_set.source_edits_of(EditKind::Property).is_empty());
    assert!(change_set.source_edits_of(EditKind::ConstructorAssignment).is_empty());
}

/// Invalid configuration is rejected before any request runs.
#[test]
fn test_invalid_configuration_is_rejected() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = dir.path().join("drupalls.json");
    std::fs::write(&config_path, r#"{"indent": "--"}"#).expect("Failed to write config");

    assert!(ConfigLoader::load(&config_path).is_err());
}

/// Change-sets travel to the editor as JSON.
#[test]
fn test_change_set_serializes_for_the_client() {
    let module = create_module();
    let registry = RegistrySnapshot::from_yaml_str(CORE_SERVICES).expect("registry");
    let dependencies = [DependencyRequest::new("logger.factory")];
    let source = read(&module.source_path);
    let request = InjectionRequest::new(
        &module.source_path,
        &source,
        &dependencies,
        ArtifactKind::RegistryInstantiated,
    );
    let change_set = InjectionEngine::default()
        .compute_injection_edits(request, &registry, &ModuleServicesLocator)
        .expect("Injection should succeed");

    let json = serde_json::to_value(&change_set).expect("Change-set should serialize");
    assert_eq!(json["companion"]["status"], "updated");
    assert_eq!(json["files"][0]["target"]["type"], "source");
    assert_eq!(json["files"][1]["target"]["type"], "companion");
    assert!(json["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(json["files"][0]["edits"][0]["kind"], "import");
}
