//! Test: required vs optional patch handling

use crate::helpers::*;
use relpipe::core::pipeline::{STAGE_BUILD, STAGE_PATCHES};
use relpipe::core::StageState;
use relpipe::execution::BuildEvent;

const PLAN_REQUIRED: &str = r##"
project: "Viewer"
tag: "v1.0.0"
platform: "linux-rocky9"
source:
  repo_url: "https://example.com/viewer.git"
  submodules: false
patches:
  - file: "src/config.h"
    find: "#define OLD_API 1"
    replace: "#define OLD_API 0"
    required: true
    reason: "upstream default breaks this platform"
build:
  command: ["make"]
  binary: "install/bin/viewer"
archive:
  staged_dir: "install"
"##;

const PLAN_OPTIONAL: &str = r##"
project: "Viewer"
tag: "v1.0.0"
platform: "linux-rocky9"
source:
  repo_url: "https://example.com/viewer.git"
  submodules: false
patches:
  - file: "src/config.h"
    find: "#define OLD_API 1"
    replace: "#define OLD_API 0"
    reason: "cosmetic, newer tags dropped this define"
build:
  command: ["make"]
  binary: "install/bin/viewer"
archive:
  staged_dir: "install"
"##;

#[tokio::test]
async fn test_required_patch_with_missing_context_fails_run() {
    let workdir = temp_workdir("patch-req");
    let plan = plan_in_workdir(PLAN_REQUIRED, &workdir);
    let source_dir = seed_cached_checkout(&workdir, &plan);

    // File exists but without the expected context
    std::fs::create_dir_all(source_dir.join("src")).unwrap();
    std::fs::write(source_dir.join("src/config.h"), "#define NEW_API 1\n").unwrap();

    // Only the checkout commands run; patching stops the pipeline
    let result = run_plan_with_mock(
        plan,
        vec![success(""), success(""), success("v1.0.0")],
    )
    .await;

    assert_pipeline_failed_at(&result, STAGE_PATCHES);
    let error = result.stage_error(STAGE_PATCHES).unwrap();
    assert!(error.contains("src/config.h"), "error was: {}", error);

    // The build stage never ran
    assert!(matches!(
        result.pipeline.stage_state(STAGE_BUILD),
        Some(StageState::Pending)
    ));
    assert_programs(&result, &["git", "git", "git"]);

    std::fs::remove_dir_all(&workdir).ok();
}

#[tokio::test]
async fn test_optional_patch_with_missing_context_warns_and_continues() {
    let workdir = temp_workdir("patch-opt");
    let plan = plan_in_workdir(PLAN_OPTIONAL, &workdir);
    let source_dir = seed_cached_checkout(&workdir, &plan);

    std::fs::create_dir_all(source_dir.join("src")).unwrap();
    std::fs::write(source_dir.join("src/config.h"), "#define NEW_API 1\n").unwrap();
    std::fs::create_dir_all(source_dir.join("install/bin")).unwrap();
    std::fs::write(source_dir.join("install/bin/viewer"), "binary").unwrap();

    let result = run_plan_with_mock(
        plan,
        vec![success(""), success(""), success("v1.0.0"), success("")],
    )
    .await;

    assert_pipeline_completed(&result);

    // The skip surfaced as a warning event, not a failure
    assert!(result.events.iter().any(|e| matches!(
        e,
        BuildEvent::StageWarning { stage_id, .. } if stage_id == STAGE_PATCHES
    )));

    // The file was left untouched
    let content = std::fs::read_to_string(source_dir.join("src/config.h")).unwrap();
    assert_eq!(content, "#define NEW_API 1\n");

    std::fs::remove_dir_all(&workdir).ok();
}

#[tokio::test]
async fn test_rerun_over_patched_tree_is_idempotent() {
    let workdir = temp_workdir("patch-rerun");
    let plan = plan_in_workdir(PLAN_REQUIRED, &workdir);
    let source_dir = seed_cached_checkout(&workdir, &plan);

    std::fs::create_dir_all(source_dir.join("src")).unwrap();
    // Replacement already present, as after a previous run
    std::fs::write(source_dir.join("src/config.h"), "#define OLD_API 0\n").unwrap();
    std::fs::create_dir_all(source_dir.join("install/bin")).unwrap();
    std::fs::write(source_dir.join("install/bin/viewer"), "binary").unwrap();

    let result = run_plan_with_mock(
        plan,
        vec![success(""), success(""), success("v1.0.0"), success("")],
    )
    .await;

    assert_pipeline_completed(&result);
    let summary = result.stage_summary(STAGE_PATCHES).unwrap();
    assert!(
        summary.contains("already applied"),
        "summary was: {}",
        summary
    );

    let content = std::fs::read_to_string(source_dir.join("src/config.h")).unwrap();
    assert_eq!(content, "#define OLD_API 0\n");

    std::fs::remove_dir_all(&workdir).ok();
}
