//! Test: full pipeline run over a cached checkout

use crate::helpers::*;
use relpipe::core::pipeline::{STAGE_BUILD, STAGE_DEPS, STAGE_ENVIRONMENT, STAGE_PATCHES};

fn plan_yaml(qt_candidate: &str) -> String {
    format!(
        r#"
project: "Stellarium"
tag: "v1.2.3"
platform: "linux-rocky9"
arch: "x86_64"
tools: ["sh"]
source:
  repo_url: "https://example.com/stellarium.git"
  submodules: false
qt:
  candidates: ["{qt_candidate}"]
  marker: "lib/libQt6Core.so"
patches:
  - file: "CMakeLists.txt"
    find: "find_package(Qt5"
    replace: "find_package(Qt6"
    reason: "build against the Qt on this platform"
deps:
  command: ["make", "deps", "-j{{{{ jobs }}}}"]
build:
  command: ["make", "-j{{{{ jobs }}}}"]
  jobs: 2
  binary: "install/bin/stellarium"
archive:
  staged_dir: "install"
"#
    )
}

#[tokio::test]
async fn test_full_pipeline_success() {
    let workdir = temp_workdir("success");

    // Fake Qt installation with its marker library
    let qt_dir = workdir.join("qt/6.5.3");
    std::fs::create_dir_all(qt_dir.join("lib")).unwrap();
    std::fs::write(qt_dir.join("lib/libQt6Core.so"), "").unwrap();

    let plan = plan_in_workdir(&plan_yaml(&qt_dir.display().to_string()), &workdir);
    let source_dir = seed_cached_checkout(&workdir, &plan);

    // Patch target and prebuilt staged output
    std::fs::write(
        source_dir.join("CMakeLists.txt"),
        "find_package(Qt5 REQUIRED)\n",
    )
    .unwrap();
    std::fs::create_dir_all(source_dir.join("install/bin")).unwrap();
    std::fs::write(source_dir.join("install/bin/stellarium"), "binary").unwrap();

    // fetch, checkout, tag check, deps, build
    let result = run_plan_with_mock(
        plan,
        vec![
            success(""),
            success(""),
            success("v1.2.3"),
            success("deps built"),
            success("build ok"),
        ],
    )
    .await;

    assert_pipeline_completed(&result);
    assert_programs(&result, &["git", "git", "git", "make", "make"]);

    // All optional stages ran
    for stage in [STAGE_PATCHES, STAGE_ENVIRONMENT, STAGE_DEPS, STAGE_BUILD] {
        assert!(
            result.stage_summary(stage).is_some(),
            "stage {} should have completed",
            stage
        );
    }

    // The patch landed in the tree
    let patched = std::fs::read_to_string(source_dir.join("CMakeLists.txt")).unwrap();
    assert!(patched.contains("find_package(Qt6"));

    // Qt was exported to the build environment and the deps command saw it
    assert_eq!(
        result.ctx.metadata.get("qt_dir"),
        Some(&qt_dir.display().to_string())
    );
    let deps_request = &result.requests[3];
    assert_eq!(deps_request.args, vec!["deps", "-j2"]);
    assert_eq!(deps_request.cwd.as_deref(), Some(source_dir.as_path()));
    assert_eq!(
        deps_request.env.get("QTDIR"),
        Some(&qt_dir.display().to_string())
    );

    // Deterministic artifact name, written into the workdir
    let artifact = result.pipeline.artifact.clone().expect("artifact recorded");
    assert!(artifact.ends_with("Stellarium-v1.2.3-linux-rocky9-x86_64.tar.gz"));
    assert!(std::path::Path::new(&artifact).is_file());

    std::fs::remove_dir_all(&workdir).ok();
}

#[tokio::test]
async fn test_minimal_plan_skips_optional_stages() {
    let workdir = temp_workdir("minimal");
    let plan = plan_in_workdir(
        r#"
project: "Viewer"
tag: "v0.1.0"
platform: "linux-rocky9"
source:
  repo_url: "https://example.com/viewer.git"
  submodules: false
build:
  command: ["make"]
  binary: "install/bin/viewer"
archive:
  staged_dir: "install"
"#,
        &workdir,
    );
    let source_dir = seed_cached_checkout(&workdir, &plan);
    std::fs::create_dir_all(source_dir.join("install/bin")).unwrap();
    std::fs::write(source_dir.join("install/bin/viewer"), "binary").unwrap();

    let result = run_plan_with_mock(
        plan,
        vec![success(""), success(""), success("v0.1.0"), success("")],
    )
    .await;

    assert_pipeline_completed(&result);
    // No patches/environment/deps slots exist for this plan
    assert!(result.pipeline.stage_state(STAGE_PATCHES).is_none());
    assert!(result.pipeline.stage_state(STAGE_ENVIRONMENT).is_none());
    assert!(result.pipeline.stage_state(STAGE_DEPS).is_none());

    std::fs::remove_dir_all(&workdir).ok();
}
