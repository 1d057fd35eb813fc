//! Fixture persistence properties: manifest uniqueness, regeneration
//! stability, and the cleanup containment guard.
use coreutils_fixgen::pipeline::ensure_within_project;
use coreutils_fixgen::schema::{CommandInvocation, ExecutionResult, Tier};
use coreutils_fixgen::store::OutputRepository;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn sample_invocation() -> CommandInvocation {
    let mut metadata = BTreeMap::new();
    metadata.insert("option_source".to_string(), "man".to_string());
    CommandInvocation::new(
        "grep",
        vec!["--color=auto".to_string()],
        vec!["file.txt".to_string()],
        Tier::Tier0,
        metadata,
    )
}

fn sample_result() -> ExecutionResult {
    ExecutionResult {
        stdout: "pattern line\n".to_string(),
        stderr: String::new(),
        exit_code: 0,
        duration_ms: 40,
        full_command: "grep --color=auto file.txt".to_string(),
        environment: "coreutils-docker".to_string(),
    }
}

#[test]
fn regenerated_fixture_differs_only_in_generated_at() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = OutputRepository::new(dir.path()).expect("repo");
    let invocation = sample_invocation();
    let result = sample_result();

    let path = repo.save(&invocation, &result).expect("first save");
    let first: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read first")).expect("parse");
    let path = repo.save(&invocation, &result).expect("second save");
    let second: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read second")).expect("parse");

    let mut first_stripped = first.clone();
    let mut second_stripped = second.clone();
    first_stripped
        .as_object_mut()
        .expect("object")
        .remove("generated_at");
    second_stripped
        .as_object_mut()
        .expect("object")
        .remove("generated_at");
    assert_eq!(first_stripped, second_stripped);

    assert!(first.get("generated_at").is_some());
    assert_eq!(
        first.get("scenario_id"),
        Some(&serde_json::Value::String(invocation.scenario_id.clone()))
    );
}

#[test]
fn manifest_is_unique_by_scenario_id_across_resaves() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = OutputRepository::new(dir.path()).expect("repo");
    let invocation = sample_invocation();
    let result = sample_result();

    for _ in 0..3 {
        repo.save(&invocation, &result).expect("save");
    }

    let manifest = repo.load_manifest().expect("manifest");
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].scenario_id, invocation.scenario_id);
    assert_eq!(manifest[0].option_source.as_deref(), Some("man"));
}

#[test]
fn cleanup_guard_rejects_etc() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(ensure_within_project(dir.path(), Path::new("/etc")).is_err());
}

#[test]
fn cleanup_guard_accepts_nested_fixture_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("tests").join("fixtures");
    fs::create_dir_all(&nested).expect("create nested");
    assert!(ensure_within_project(dir.path(), &nested).is_ok());
}
