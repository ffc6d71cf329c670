//! Test: artifact naming and content

use crate::helpers::*;
use relpipe::core::config::ArchiveFormat;
use relpipe::stages::package::unpack_tar;

const PLAN: &str = r#"
project: "Stellarium"
tag: "v1.2.3"
platform: "linux-rocky9"
arch: "x86_64"
source:
  repo_url: "https://example.com/stellarium.git"
  submodules: false
build:
  command: ["make"]
  binary: "install/bin/stellarium"
archive:
  staged_dir: "install"
"#;

#[tokio::test]
async fn test_artifact_contains_staged_tree_verbatim() {
    let workdir = temp_workdir("pkg");
    let plan = plan_in_workdir(PLAN, &workdir);
    let source_dir = seed_cached_checkout(&workdir, &plan);

    let staged = source_dir.join("install");
    std::fs::create_dir_all(staged.join("bin")).unwrap();
    std::fs::create_dir_all(staged.join("share/skycultures")).unwrap();
    std::fs::write(staged.join("bin/stellarium"), b"\x7fELF binary contents").unwrap();
    std::fs::write(staged.join("share/skycultures/western.dat"), vec![9u8, 8, 7]).unwrap();

    let result = run_plan_with_mock(
        plan,
        vec![success(""), success(""), success("v1.2.3"), success("")],
    )
    .await;

    assert_pipeline_completed(&result);

    let artifact = result.pipeline.artifact.clone().unwrap();
    assert!(
        artifact.ends_with("Stellarium-v1.2.3-linux-rocky9-x86_64.tar.gz"),
        "artifact was: {}",
        artifact
    );

    let extracted = workdir.join("extracted");
    unpack_tar(
        std::path::Path::new(&artifact),
        &extracted,
        ArchiveFormat::TarGz,
    )
    .await
    .unwrap();

    assert_eq!(
        std::fs::read(extracted.join("bin/stellarium")).unwrap(),
        b"\x7fELF binary contents"
    );
    assert_eq!(
        std::fs::read(extracted.join("share/skycultures/western.dat")).unwrap(),
        vec![9u8, 8, 7]
    );

    std::fs::remove_dir_all(&workdir).ok();
}

#[tokio::test]
async fn test_archive_name_is_deterministic_across_runs() {
    let mut names = Vec::new();

    for label in ["det-a", "det-b"] {
        let workdir = temp_workdir(label);
        let plan = plan_in_workdir(PLAN, &workdir);
        let source_dir = seed_cached_checkout(&workdir, &plan);
        std::fs::create_dir_all(source_dir.join("install/bin")).unwrap();
        std::fs::write(source_dir.join("install/bin/stellarium"), "binary").unwrap();

        let result = run_plan_with_mock(
            plan,
            vec![success(""), success(""), success("v1.2.3"), success("")],
        )
        .await;

        assert_pipeline_completed(&result);
        let artifact = result.pipeline.artifact.clone().unwrap();
        names.push(
            std::path::Path::new(&artifact)
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .to_string(),
        );

        std::fs::remove_dir_all(&workdir).ok();
    }

    assert_eq!(names[0], names[1]);
    assert_eq!(names[0], "Stellarium-v1.2.3-linux-rocky9-x86_64.tar.gz");
}
