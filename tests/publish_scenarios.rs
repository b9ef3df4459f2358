//! End-to-end publish scenarios against local directory repositories.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use module_publisher::configuration::{ConfigurationGraph, ConfigurationSpec};
use module_publisher::core::{
    ArtifactDescriptor, ArtifactFileSet, ConfigLoadOptions, DescriptorCodec, ModuleIdentity,
    PublicationTarget, PublishError, PublishState, PublishStateMachine,
};
use module_publisher::descriptor::{DescriptorBuilder, JsonDescriptorCodec, ModuleDescriptor};
use module_publisher::orchestration::{
    ModulePublisher, PublicationCoordinator, PublishOptions, PublishRequest, PublishStatus,
};
use module_publisher::targets::FilesystemTarget;

fn module() -> ModuleIdentity {
    ModuleIdentity::new("org.example", "native-lib", "2.1.0").unwrap()
}

/// `compile` declares lib.jar; `runtime` extends it and adds native.so.
fn runtime_graph() -> ConfigurationGraph {
    let mut graph = ConfigurationGraph::new();
    graph
        .add_configuration(
            ConfigurationSpec::new("compile").artifact(ArtifactDescriptor::new("lib", "lib.jar")),
        )
        .unwrap();
    graph
        .add_configuration(
            ConfigurationSpec::new("runtime")
                .extends_from("compile")
                .artifact(ArtifactDescriptor::new("lib", "lib.jar"))
                .artifact(ArtifactDescriptor::new("native", "native.so")),
        )
        .unwrap();
    graph
}

fn write_artifacts(dir: &Path) {
    std::fs::write(dir.join("lib.jar"), b"lib").unwrap();
    std::fs::write(dir.join("native.so"), b"native").unwrap();
}

fn target(name: &str, root: impl AsRef<Path>) -> Arc<dyn PublicationTarget> {
    Arc::new(FilesystemTarget::new(name, root.as_ref()))
}

fn version_dir(root: &Path) -> std::path::PathBuf {
    root.join("org.example/native-lib/2.1.0")
}

#[test]
fn runtime_publication_carries_inherited_and_own_artifacts() {
    let graph = runtime_graph();
    let descriptor = DescriptorBuilder::new(&graph)
        .build(module(), ["runtime"])
        .unwrap();

    let files: Vec<&Path> = descriptor
        .artifacts()
        .iter()
        .map(|a| a.artifact.file.as_path())
        .collect();
    assert_eq!(files, vec![Path::new("lib.jar"), Path::new("native.so")]);
    for attributed in descriptor.artifacts() {
        assert_eq!(
            attributed.configurations.iter().collect::<Vec<_>>(),
            vec!["runtime"]
        );
    }
}

#[test]
fn shared_parent_artifact_is_attributed_to_both_children() {
    let mut graph = ConfigurationGraph::new();
    graph
        .add_configuration(
            ConfigurationSpec::new("base").artifact(ArtifactDescriptor::new("core", "core.jar")),
        )
        .unwrap();
    graph
        .add_configuration(ConfigurationSpec::new("api").extends_from("base"))
        .unwrap();
    graph
        .add_configuration(ConfigurationSpec::new("impl").extends_from("base"))
        .unwrap();

    let descriptor = DescriptorBuilder::new(&graph)
        .build(module(), ["impl", "api"])
        .unwrap();

    assert_eq!(descriptor.artifacts().len(), 1);
    assert_eq!(
        descriptor.artifacts()[0]
            .configurations
            .iter()
            .collect::<Vec<_>>(),
        vec!["api", "impl"]
    );
}

#[tokio::test]
async fn empty_publication_fails_before_any_io() {
    let graph = runtime_graph();

    let result = DescriptorBuilder::new(&graph).build(module(), Vec::<&str>::new());

    assert_eq!(result.unwrap_err(), PublishError::EmptyPublication);
}

#[tokio::test]
async fn failing_middle_target_stops_the_run() {
    let work = TempDir::new().unwrap();
    write_artifacts(work.path());
    // A regular file where a directory is needed makes the second target fail
    std::fs::write(work.path().join("blocked"), b"").unwrap();

    let graph = runtime_graph();
    let descriptor = Arc::new(
        DescriptorBuilder::new(&graph)
            .build(module(), ["runtime"])
            .unwrap(),
    );
    let artifacts = descriptor.artifact_files(work.path());
    let descriptor_path = work.path().join("out/module.json");

    let request = PublishRequest::new(
        Arc::clone(&descriptor),
        artifacts,
        vec![
            target("local", work.path().join("local")),
            target("staging", work.path().join("blocked/repo")),
            target("release", work.path().join("release")),
        ],
        &descriptor_path,
    )
    .unwrap();

    let outcome = PublicationCoordinator::new(Arc::new(JsonDescriptorCodec::new()))
        .publish(request)
        .await;

    assert_eq!(outcome.status(), PublishStatus::TargetFailed);
    assert_eq!(outcome.succeeded_targets, vec!["local"]);
    assert_eq!(outcome.failed_target.as_deref(), Some("staging"));
    assert_eq!(outcome.skipped_targets, vec!["release"]);
    assert!(version_dir(&work.path().join("local")).join("lib-2.1.0.jar").exists());
    assert!(!work.path().join("release").exists());

    // The descriptor written before the targets reads back unchanged
    let written: ModuleDescriptor = JsonDescriptorCodec::new()
        .read(&descriptor_path)
        .await
        .unwrap();
    assert_eq!(&written, descriptor.as_ref());
}

#[tokio::test]
async fn retry_with_remaining_targets_after_partial_failure() {
    let work = TempDir::new().unwrap();
    write_artifacts(work.path());
    std::fs::write(work.path().join("blocked"), b"").unwrap();

    let graph = runtime_graph();
    let descriptor = Arc::new(
        DescriptorBuilder::new(&graph)
            .build(module(), ["runtime"])
            .unwrap(),
    );
    let descriptor_path = work.path().join("module.json");
    let coordinator = PublicationCoordinator::new(Arc::new(JsonDescriptorCodec::new()));
    let mut state = PublishStateMachine::new(work.path().join("state/publish.json"));

    let first = coordinator
        .publish_tracked(
            PublishRequest::new(
                Arc::clone(&descriptor),
                descriptor.artifact_files(work.path()),
                vec![
                    target("local", work.path().join("local")),
                    target("remote", work.path().join("blocked/remote")),
                ],
                &descriptor_path,
            )
            .unwrap(),
            &mut state,
        )
        .await;
    assert_eq!(first.status(), PublishStatus::TargetFailed);
    assert_eq!(state.get_state(), PublishState::PartiallyPublished);

    // A fresh process restores the progress and narrows the target list
    std::fs::remove_file(work.path().join("blocked")).unwrap();
    let mut restored = PublishStateMachine::new(work.path().join("state/publish.json"));
    assert!(restored.restore().await.unwrap());
    assert!(restored.can_resume());
    let remaining = restored.remaining_targets(&module(), ["local", "remote"]);
    assert_eq!(remaining, vec!["remote"]);

    let second = coordinator
        .publish_tracked(
            PublishRequest::new(
                Arc::clone(&descriptor),
                descriptor.artifact_files(work.path()),
                vec![target("remote", work.path().join("blocked/remote"))],
                &descriptor_path,
            )
            .unwrap(),
            &mut restored,
        )
        .await;

    assert!(second.is_success());
    assert_eq!(restored.get_state(), PublishState::Completed);
    assert_eq!(restored.succeeded_targets(), ["local", "remote"]);
    assert!(
        version_dir(&work.path().join("blocked/remote"))
            .join("native-2.1.0.so")
            .exists()
    );
}

#[tokio::test]
async fn descriptor_codec_writes_atomically_into_new_directories() {
    let work = TempDir::new().unwrap();
    let graph = runtime_graph();
    let descriptor = DescriptorBuilder::new(&graph)
        .build(module(), ["compile", "runtime"])
        .unwrap();
    let destination = work.path().join("a/b/c/module.json");

    JsonDescriptorCodec::new()
        .write(&descriptor, &destination)
        .await
        .unwrap();

    let entries: Vec<_> = std::fs::read_dir(work.path().join("a/b/c"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["module.json"]);
}

const TOML_CONFIG: &str = r#"
version = "1.0"
status = "milestone"

[module]
group = "org.example"
name = "native-lib"
version = "2.1.0"

[[configurations]]
name = "runtime"
extendsFrom = ["compile"]
artifacts = [{ name = "lib", file = "lib.jar" }, { name = "native", file = "native.so" }]

[[configurations]]
name = "compile"
artifacts = [{ name = "lib", file = "lib.jar" }]

[publish]
configurations = ["runtime"]
descriptor = "out/native-lib.module.json"

[[targets]]
type = "filesystem"
name = "local"
path = "repo"
"#;

#[tokio::test]
async fn module_publisher_runs_from_toml_declaration() {
    let project = TempDir::new().unwrap();
    write_artifacts(project.path());
    std::fs::write(project.path().join("module-publish.toml"), TOML_CONFIG).unwrap();

    let mut publisher = ModulePublisher::new(project.path()).with_load_options(ConfigLoadOptions {
        project_path: project.path().to_path_buf(),
        ..Default::default()
    });
    let report = publisher.publish(PublishOptions::default()).await.unwrap();

    assert!(report.success());
    assert_eq!(
        report.descriptor_path,
        project.path().join("out/native-lib.module.json")
    );

    let dir = version_dir(&project.path().join("repo"));
    assert_eq!(std::fs::read(dir.join("lib-2.1.0.jar")).unwrap(), b"lib");
    assert_eq!(std::fs::read(dir.join("native-2.1.0.so")).unwrap(), b"native");

    let descriptor = JsonDescriptorCodec::new()
        .read(&dir.join("native-lib-2.1.0.module.json"))
        .await
        .unwrap();
    assert_eq!(descriptor.status(), "milestone");
    assert_eq!(descriptor.artifacts().len(), 2);
}

#[tokio::test]
async fn cyclic_declaration_is_rejected_before_writing() {
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("module-publish.yaml"),
        r#"
module: { group: org.example, name: demo, version: 1.0.0 }
configurations:
  - { name: a, extendsFrom: [b] }
  - { name: b, extendsFrom: [a] }
publish:
  configurations: [a]
targets:
  - { name: local, type: filesystem, path: repo }
"#,
    )
    .unwrap();

    let mut publisher = ModulePublisher::new(project.path()).with_load_options(ConfigLoadOptions {
        project_path: project.path().to_path_buf(),
        ..Default::default()
    });
    let result = publisher.publish(PublishOptions::default()).await;

    assert!(result.is_err());
    assert!(!project.path().join("build").exists());
    assert!(!project.path().join("repo").exists());
}

#[test]
fn artifact_file_set_skips_duplicates() {
    let mut files = ArtifactFileSet::new();
    let lib = ArtifactDescriptor::new("lib", "lib.jar");

    assert!(files.insert(lib.clone(), "/work/lib.jar"));
    assert!(!files.insert(lib, "/elsewhere/lib.jar"));
    assert_eq!(files.len(), 1);
}
