//! Test: failure paths and diagnostics

use crate::helpers::*;
use relpipe::core::pipeline::{STAGE_BUILD, STAGE_CHECKOUT, STAGE_DEPS, STAGE_PACKAGE};
use relpipe::core::StageState;
use relpipe::execution::BuildEvent;

const PLAN: &str = r#"
project: "Viewer"
tag: "v1.0.0"
platform: "linux-rocky9"
source:
  repo_url: "https://example.com/viewer.git"
  submodules: false
build:
  command: ["make"]
  binary: "install/bin/viewer"
diagnostics:
  error_pattern: "(?i)\\berror\\b"
  logs:
    - path: "build.log"
archive:
  staged_dir: "install"
"#;

#[tokio::test]
async fn test_build_failure_scrapes_configured_logs() {
    let workdir = temp_workdir("fail-build");
    let plan = plan_in_workdir(PLAN, &workdir);
    let source_dir = seed_cached_checkout(&workdir, &plan);

    std::fs::write(
        source_dir.join("build.log"),
        "compiling viewer.cpp\nerror: no member named render\nlinking\n",
    )
    .unwrap();

    let result = run_plan_with_mock(
        plan,
        vec![
            success(""),
            success(""),
            success("v1.0.0"),
            failure(2, "make: *** [viewer] Error 2"),
        ],
    )
    .await;

    assert_pipeline_failed_at(&result, STAGE_BUILD);
    assert!(matches!(
        result.pipeline.stage_state(STAGE_PACKAGE),
        Some(StageState::Pending)
    ));
    assert!(result.pipeline.artifact.is_none());

    let excerpts = result
        .events
        .iter()
        .find_map(|e| match e {
            BuildEvent::DiagnosticsCollected { excerpts, .. } => Some(excerpts.clone()),
            _ => None,
        })
        .expect("diagnostics should have been collected");

    assert_eq!(excerpts.len(), 1);
    assert_eq!(excerpts[0].total_matches, 1);
    assert!(excerpts[0].head[0].contains("no member named render"));

    std::fs::remove_dir_all(&workdir).ok();
}

#[tokio::test]
async fn test_successful_exit_with_missing_binary_fails() {
    let workdir = temp_workdir("fail-binary");
    let plan = plan_in_workdir(PLAN, &workdir);
    seed_cached_checkout(&workdir, &plan);

    // Build reports success but never produces the binary
    let result = run_plan_with_mock(
        plan,
        vec![success(""), success(""), success("v1.0.0"), success("done")],
    )
    .await;

    assert_pipeline_failed_at(&result, STAGE_BUILD);
    let error = result.stage_error(STAGE_BUILD).unwrap();
    assert!(
        error.contains("binary") && error.contains("missing"),
        "error was: {}",
        error
    );

    std::fs::remove_dir_all(&workdir).ok();
}

#[tokio::test]
async fn test_tag_mismatch_fails_checkout() {
    let workdir = temp_workdir("fail-tag");
    let plan = plan_in_workdir(PLAN, &workdir);
    seed_cached_checkout(&workdir, &plan);

    // The working tree sits at a different tag than the plan pins
    let result = run_plan_with_mock(
        plan,
        vec![success(""), success(""), success("v1.1.0")],
    )
    .await;

    assert_pipeline_failed_at(&result, STAGE_CHECKOUT);
    let error = result.stage_error(STAGE_CHECKOUT).unwrap();
    assert!(error.contains("v1.1.0") && error.contains("v1.0.0"));

    std::fs::remove_dir_all(&workdir).ok();
}

#[tokio::test]
async fn test_deps_failure_also_collects_diagnostics() {
    let workdir = temp_workdir("fail-deps");
    let yaml = format!(
        "{}\ndeps:\n  command: [\"make\", \"deps\"]\n",
        PLAN.trim_end()
    );
    let plan = plan_in_workdir(&yaml, &workdir);
    let source_dir = seed_cached_checkout(&workdir, &plan);

    std::fs::write(
        source_dir.join("build.log"),
        "ERROR: failed to configure zlib\n",
    )
    .unwrap();

    let result = run_plan_with_mock(
        plan,
        vec![
            success(""),
            success(""),
            success("v1.0.0"),
            failure(1, "deps failed"),
        ],
    )
    .await;

    assert_pipeline_failed_at(&result, STAGE_DEPS);
    assert!(result.events.iter().any(|e| matches!(
        e,
        BuildEvent::DiagnosticsCollected { stage_id, .. } if stage_id == STAGE_DEPS
    )));

    std::fs::remove_dir_all(&workdir).ok();
}

#[cfg(unix)]
#[tokio::test]
async fn test_unwritable_cached_checkout_fails_before_git() {
    use std::os::unix::fs::PermissionsExt;

    let workdir = temp_workdir("fail-perms");
    let plan = plan_in_workdir(PLAN, &workdir);
    let source_dir = seed_cached_checkout(&workdir, &plan);
    std::fs::set_permissions(&source_dir, std::fs::Permissions::from_mode(0o555)).unwrap();

    // No scripted outputs: the stage must fail before any subprocess
    let result = run_plan_with_mock(plan, vec![]).await;

    assert_pipeline_failed_at(&result, STAGE_CHECKOUT);
    let error = result.stage_error(STAGE_CHECKOUT).unwrap();
    assert!(error.contains("not writable"), "error was: {}", error);
    assert!(result.requests.is_empty());

    std::fs::set_permissions(&source_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
    std::fs::remove_dir_all(&workdir).ok();
}
