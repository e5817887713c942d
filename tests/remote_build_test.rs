use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use snapcraft_remote::adapters::prompt::FixedPrompter;
use snapcraft_remote::domain::model::BuilderVariant;
use snapcraft_remote::project::{build_plan::get_build_plan, load_project};
use snapcraft_remote::utils::error::{RemoteBuildError, EX_NOPERM, EX_TEMPFAIL};
use snapcraft_remote::{FarmBuilder, FarmClient, RemoteBuildCommand, RemoteBuildOptions};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const BUILD_ID: &str = "snapcraft-test-0123456789abcdef";

/// Project directory, output directory and the bare repository standing in
/// for the farm's git remote.
struct Fixture {
    project: TempDir,
    output: TempDir,
    remote: TempDir,
}

impl Fixture {
    fn new(snapcraft_yaml: &str) -> Result<Self> {
        let project = TempDir::new()?;
        let output = TempDir::new()?;
        let remote = TempDir::new()?;

        std::fs::write(project.path().join("snapcraft.yaml"), snapcraft_yaml)?;
        std::fs::create_dir_all(project.path().join("src"))?;
        std::fs::write(project.path().join("src/hello.sh"), "#!/bin/sh\necho hello\n")?;
        git2::Repository::init_bare(remote.path())?;

        Ok(Self {
            project,
            output,
            remote,
        })
    }

    fn git_url(&self) -> String {
        self.remote.path().to_string_lossy().to_string()
    }

    fn options(&self) -> RemoteBuildOptions {
        RemoteBuildOptions {
            launchpad_accept_public_upload: true,
            build_id: Some(BUILD_ID.to_string()),
            project_dir: self.project.path().to_path_buf(),
            output_dir: self.output.path().to_path_buf(),
            poll_interval: Duration::from_millis(20),
            ..RemoteBuildOptions::default()
        }
    }

    fn command(
        &self,
        server: &MockServer,
        variant: BuilderVariant,
        answer: bool,
        options: RemoteBuildOptions,
    ) -> Result<RemoteBuildCommand<FarmBuilder, FixedPrompter>> {
        let project_file = load_project(self.project.path())?;
        let project = project_file.project.clone();
        let plan = get_build_plan(&project);
        let client = FarmClient::new(&server.base_url(), Some("secret".to_string()))?;
        let builder = FarmBuilder::new(client, variant, project_file, plan, Vec::new());
        Ok(RemoteBuildCommand::new(
            builder,
            FixedPrompter::new(answer),
            project,
            variant,
            options,
        ))
    }
}

fn remote_has_file(remote: &Path, file: &str) -> Result<bool> {
    let repo = git2::Repository::open_bare(remote)?;
    let tree = repo.find_reference("refs/heads/main")?.peel_to_tree()?;
    Ok(tree.get_path(Path::new(file)).is_ok())
}

const CORE24_PROJECT: &str = "name: test\nbase: core24\nplatforms:\n  amd64:\n";

#[tokio::test]
async fn test_remote_build_success() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(CORE24_PROJECT)?;

    let create_repo = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/repositories")
                .header("Authorization", "Bearer secret")
                .json_body_partial(format!(r#"{{"build_id": "{}"}}"#, BUILD_ID));
            then.status(201)
                .json_body(json!({ "git_url": fixture.git_url() }));
        })
        .await;
    let request_builds = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/builds")
                .json_body_partial(r#"{"snap_name": "test", "architectures": ["amd64"], "variant": "current"}"#);
            then.status(201)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "pending" }] }));
        })
        .await;
    let poll = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}", BUILD_ID));
            then.status(200)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "success" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/logs/amd64", BUILD_ID));
            then.status(200).body("build log\n");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/artifacts", BUILD_ID));
            then.status(200).json_body(json!({
                "artifacts": [{
                    "arch": "amd64",
                    "name": "test_1.0_amd64.snap",
                    "url": server.url("/files/test_1.0_amd64.snap"),
                }]
            }));
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET).path("/files/test_1.0_amd64.snap");
            then.status(200).body("snap contents");
        })
        .await;
    let delete_repo = server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/repositories/{}", BUILD_ID));
            then.status(204);
        })
        .await;

    let mut command = fixture.command(&server, BuilderVariant::Current, true, fixture.options())?;
    let code = command.run().await?;

    assert_eq!(code, 0);
    create_repo.assert_async().await;
    request_builds.assert_async().await;
    download.assert_async().await;
    delete_repo.assert_async().await;
    assert!(poll.hits_async().await >= 1);

    let snap = fixture.output.path().join("test_1.0_amd64.snap");
    assert_eq!(std::fs::read_to_string(snap)?, "snap contents");

    let logs: Vec<_> = std::fs::read_dir(fixture.output.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("test_amd64-") && name.ends_with(".txt"))
        .collect();
    assert_eq!(logs.len(), 1);

    assert!(remote_has_file(fixture.remote.path(), "snapcraft.yaml")?);
    assert!(remote_has_file(fixture.remote.path(), "src/hello.sh")?);

    Ok(())
}

#[tokio::test]
async fn test_failed_build_returns_error_code() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(CORE24_PROJECT)?;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/repositories");
            then.status(201)
                .json_body(json!({ "git_url": fixture.git_url() }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/builds");
            then.status(201)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "pending" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}", BUILD_ID));
            then.status(200)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "failed" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/logs/amd64", BUILD_ID));
            then.status(200).body("error: build failed\n");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/artifacts", BUILD_ID));
            then.status(200).json_body(json!({ "artifacts": [] }));
        })
        .await;
    let delete_repo = server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/repositories/{}", BUILD_ID));
            then.status(204);
        })
        .await;

    let mut command = fixture.command(&server, BuilderVariant::Current, true, fixture.options())?;
    assert_eq!(command.run().await?, 1);
    delete_repo.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_timeout_keeps_remote_repository() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(CORE24_PROJECT)?;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/repositories");
            then.status(201)
                .json_body(json!({ "git_url": fixture.git_url() }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/builds");
            then.status(201)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "pending" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}", BUILD_ID));
            then.status(200)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "building" }] }));
        })
        .await;
    let delete_repo = server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/repositories/{}", BUILD_ID));
            then.status(204);
        })
        .await;

    let mut options = fixture.options();
    options.launchpad_timeout = 1;
    options.poll_interval = Duration::from_millis(100);

    let mut command = fixture.command(&server, BuilderVariant::Current, true, options)?;
    assert_eq!(command.run().await?, EX_TEMPFAIL);
    assert_eq!(delete_repo.hits_async().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_repository_conflict_is_temporary_failure() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(CORE24_PROJECT)?;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/repositories");
            then.status(409).body("repository exists");
        })
        .await;
    let request_builds = server
        .mock_async(|when, then| {
            when.method(POST).path("/builds");
            then.status(201).json_body(json!({ "builds": [] }));
        })
        .await;
    let delete_repo = server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/repositories/{}", BUILD_ID));
            then.status(204);
        })
        .await;

    let mut command = fixture.command(&server, BuilderVariant::Current, true, fixture.options())?;
    assert_eq!(command.run().await?, EX_TEMPFAIL);
    assert_eq!(request_builds.hits_async().await, 0);
    delete_repo.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_public_upload_must_be_acknowledged() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(CORE24_PROJECT)?;

    let create_repo = server
        .mock_async(|when, then| {
            when.method(POST).path("/repositories");
            then.status(201)
                .json_body(json!({ "git_url": fixture.git_url() }));
        })
        .await;

    let mut options = fixture.options();
    options.launchpad_accept_public_upload = false;

    let mut command = fixture.command(&server, BuilderVariant::Current, false, options)?;
    let err = command.run().await.unwrap_err();

    assert!(matches!(err, RemoteBuildError::PublicUploadNotAcknowledged));
    assert_eq!(err.exit_code(), EX_NOPERM);
    assert_eq!(create_repo.hits_async().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_private_project_does_not_prompt() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(CORE24_PROJECT)?;

    let get_project = server
        .mock_async(|when, then| {
            when.method(GET).path("/projects/team-project");
            then.status(200)
                .json_body(json!({ "name": "team-project", "private": true }));
        })
        .await;
    let create_repo = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/repositories")
                .json_body_partial(r#"{"project": "team-project"}"#);
            then.status(201)
                .json_body(json!({ "git_url": fixture.git_url() }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/builds");
            then.status(201)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "pending" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}", BUILD_ID));
            then.status(200)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "success" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/logs/amd64", BUILD_ID));
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/artifacts", BUILD_ID));
            then.status(200).json_body(json!({ "artifacts": [] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/repositories/{}", BUILD_ID));
            then.status(204);
        })
        .await;

    let mut options = fixture.options();
    options.launchpad_accept_public_upload = false;
    options.project = Some("team-project".to_string());

    // 回答 false：若仍詢問則會失敗
    let mut command = fixture.command(&server, BuilderVariant::Current, false, options)?;
    let code = command.run().await?;

    get_project.assert_async().await;
    create_repo.assert_async().await;
    // 沒有日誌也沒有產物
    assert_eq!(code, 1);

    Ok(())
}

#[tokio::test]
async fn test_recover_does_not_upload() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(CORE24_PROJECT)?;

    let create_repo = server
        .mock_async(|when, then| {
            when.method(POST).path("/repositories");
            then.status(201)
                .json_body(json!({ "git_url": fixture.git_url() }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}", BUILD_ID));
            then.status(200)
                .json_body(json!({ "builds": [{ "arch": "amd64", "state": "success" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/logs/amd64", BUILD_ID));
            then.status(200).body("log\n");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/artifacts", BUILD_ID));
            then.status(200).json_body(json!({
                "artifacts": [{
                    "arch": "amd64",
                    "name": "test_1.0_amd64.snap",
                    "url": server.url("/files/test_1.0_amd64.snap"),
                }]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/files/test_1.0_amd64.snap");
            then.status(200).body("snap");
        })
        .await;
    let delete_repo = server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/repositories/{}", BUILD_ID));
            then.status(204);
        })
        .await;

    let mut options = fixture.options();
    options.recover = true;

    let mut command = fixture.command(&server, BuilderVariant::Current, true, options)?;
    assert_eq!(command.run().await?, 0);
    assert_eq!(create_repo.hits_async().await, 0);
    delete_repo.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_status_only_reports() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(CORE24_PROJECT)?;

    let get_builds = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}", BUILD_ID));
            then.status(200).json_body(json!({
                "builds": [
                    { "arch": "arm64", "state": "building" },
                    { "arch": "amd64", "state": "success" },
                ]
            }));
        })
        .await;
    let delete_repo = server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/repositories/{}", BUILD_ID));
            then.status(204);
        })
        .await;

    let mut options = fixture.options();
    options.status = true;
    options.launchpad_accept_public_upload = false;

    // status 不做驗證，也不詢問
    let mut command = fixture.command(&server, BuilderVariant::Current, false, options)?;
    assert_eq!(command.run().await?, 0);
    get_builds.assert_async().await;
    assert_eq!(delete_repo.hits_async().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_legacy_builder_uploads_source_tarballs() -> Result<()> {
    let server = MockServer::start_async().await;
    let fixture = Fixture::new(
        r#"name: test
base: core20
architectures:
  - build-on: [amd64]
    build-for: [arm64]
parts:
  hello:
    plugin: dump
    source: src
"#,
    )?;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/repositories");
            then.status(201)
                .json_body(json!({ "git_url": fixture.git_url() }));
        })
        .await;
    let request_builds = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/builds")
                .json_body_partial(r#"{"architectures": ["arm64"], "variant": "legacy"}"#);
            then.status(201)
                .json_body(json!({ "builds": [{ "arch": "arm64", "state": "pending" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}", BUILD_ID));
            then.status(200)
                .json_body(json!({ "builds": [{ "arch": "arm64", "state": "success" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/logs/arm64", BUILD_ID));
            then.status(200).body("log\n");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/builds/{}/artifacts", BUILD_ID));
            then.status(200).json_body(json!({
                "artifacts": [{
                    "arch": "arm64",
                    "name": "test_1.0_arm64.snap",
                    "url": server.url("/files/test_1.0_arm64.snap"),
                }]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/files/test_1.0_arm64.snap");
            then.status(200).body("snap");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/repositories/{}", BUILD_ID));
            then.status(204);
        })
        .await;

    let mut command = fixture.command(&server, BuilderVariant::Legacy, true, fixture.options())?;
    assert_eq!(command.run().await?, 0);
    request_builds.assert_async().await;

    assert!(remote_has_file(fixture.remote.path(), "remote-build/hello.tar.gz")?);
    let repo = git2::Repository::open_bare(fixture.remote.path())?;
    let tree = repo.find_reference("refs/heads/main")?.peel_to_tree()?;
    let entry = tree.get_path(Path::new("snapcraft.yaml"))?;
    let blob = repo.find_blob(entry.id())?;
    let uploaded = String::from_utf8_lossy(blob.content()).to_string();
    assert!(uploaded.contains("remote-build/hello.tar.gz"));

    Ok(())
}
