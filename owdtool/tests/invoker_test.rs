use owdcore::{
    error::{
        DESCRIPTIVE_ERROR,
        DeployError,
        ErrorKind,
        ToolError,
    },
    request::{
        Credentials,
        EnvData,
    },
    result::DeployResult,
    workspace::{
        MANIFEST_FILE_NAME,
        WorkspaceState,
    },
};
use owdtool::invoker::{
    Invoker,
    WskDeploy,
};
use serde_json::Value;
use std::{
    fs,
    path::Path,
    time::Duration,
};
use tempfile::TempDir;
use test_binary::build_test_binary_once;
use test_owd::manifest::MANIFEST;

build_test_binary_once!(fakedeploy, "../testing");

fn fakedeploy() -> WskDeploy {
    WskDeploy::new(path_to_fakedeploy())
}

fn workspace(
    env: &[(&str, &str)],
    credentials: Credentials,
) -> anyhow::Result<(TempDir, WorkspaceState)> {
    let tempdir = tempfile::tempdir()?;
    let repo_dir = tempdir.path().join("blueprint");
    fs::create_dir_all(repo_dir.join("runtimes/node"))?;
    fs::write(repo_dir.join("runtimes/node").join(MANIFEST_FILE_NAME), MANIFEST)?;
    let workspace = WorkspaceState {
        repo_dir,
        manifest_path: "runtimes/node".into(),
        manifest_file_name: MANIFEST_FILE_NAME.to_string(),
        credentials,
        env_data: Some(env.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<EnvData>()),
    };
    Ok((tempdir, workspace))
}

fn credentials() -> Credentials {
    Credentials {
        api_host: Some("openwhisk.example.com".to_string()),
        auth: Some("abc:123".to_string()),
    }
}

fn record(workspace: &WorkspaceState) -> anyhow::Result<Value> {
    let raw = fs::read_to_string(workspace.manifest_dir().join("fakedeploy.json"))?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::test]
async fn test_deploy_success() -> anyhow::Result<()> {
    let (_tempdir, workspace) = workspace(&[
        ("WSK_TEST_CLOUDANT_USERNAME", "admin"),
    ], credentials())?;
    let result = fakedeploy().deploy(&workspace).await?;
    assert_eq!(result, DeployResult::success());

    let record = record(&workspace)?;
    assert_eq!(record["args"], serde_json::json!([
        "-v",
        "-m", "manifest.yaml",
        "--auth", "abc:123",
        "--apihost", "openwhisk.example.com",
    ]));
    assert_eq!(record["stdin"], "y");
    assert_eq!(record["env"]["WSK_TEST_CLOUDANT_USERNAME"], "admin");
    assert_eq!(
        Path::new(record["cwd"].as_str().unwrap_or_default()).canonicalize()?,
        workspace.manifest_dir().canonicalize()?,
    );
    Ok(())
}

#[tokio::test]
async fn test_deploy_without_credentials() -> anyhow::Result<()> {
    let (_tempdir, workspace) = workspace(&[], Credentials::default())?;
    fakedeploy().deploy(&workspace).await?;
    assert_eq!(record(&workspace)?["args"], serde_json::json!([
        "-v", "-m", "manifest.yaml",
    ]));
    Ok(())
}

#[tokio::test]
async fn test_deploy_manifest_missing() -> anyhow::Result<()> {
    let (_tempdir, mut workspace) = workspace(&[], credentials())?;
    workspace.manifest_file_name = "manifest-changed-name.yaml".to_string();
    let err = fakedeploy().deploy(&workspace).await
        .expect_err("manifest is missing");
    assert_eq!(err.kind(), ErrorKind::ManifestMissing);
    // nothing was spawned, so nothing was recorded.
    assert!(!workspace.manifest_dir().join("fakedeploy.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_deploy_reported_error() -> anyhow::Result<()> {
    let (_tempdir, workspace) = workspace(&[
        ("FAKEDEPLOY_MODE", "report"),
    ], credentials())?;
    let err = fakedeploy().deploy(&workspace).await
        .expect_err("tool reported an error");
    assert_eq!(err.kind(), ErrorKind::ToolReported);
    assert_eq!(err.payload(), serde_json::json!({
        "error": "The manifest could not be deployed",
        "descriptiveError": DESCRIPTIVE_ERROR,
    }));
    Ok(())
}

#[tokio::test]
async fn test_deploy_non_zero_exit() -> anyhow::Result<()> {
    let (_tempdir, workspace) = workspace(&[
        ("FAKEDEPLOY_MODE", "fail"),
    ], credentials())?;
    match fakedeploy().deploy(&workspace).await {
        Err(DeployError::Tool(ToolError::Failed { code, stderr, .. })) => {
            assert_eq!(code, Some(2));
            assert_eq!(stderr, "unable to reach api host");
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_deploy_opaque_output() -> anyhow::Result<()> {
    for mode in ["text", "warn"] {
        let (_tempdir, workspace) = workspace(&[
            ("FAKEDEPLOY_MODE", mode),
        ], credentials())?;
        assert_eq!(fakedeploy().deploy(&workspace).await?, DeployResult::success());
    }
    Ok(())
}

#[tokio::test]
async fn test_deploy_timeout() -> anyhow::Result<()> {
    let (_tempdir, workspace) = workspace(&[
        ("FAKEDEPLOY_MODE", "sleep"),
    ], credentials())?;
    let err = fakedeploy()
        .timeout(Some(Duration::from_millis(500)))
        .deploy(&workspace)
        .await
        .expect_err("tool sleeps past the limit");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    Ok(())
}

#[tokio::test]
async fn test_deploy_missing_binary() -> anyhow::Result<()> {
    let (tempdir, workspace) = workspace(&[], credentials())?;
    let err = WskDeploy::new(tempdir.path().join("wskdeploy"))
        .deploy(&workspace)
        .await
        .expect_err("no such binary");
    assert!(matches!(err, DeployError::Tool(ToolError::Spawn { .. })));
    assert_eq!(err.kind(), ErrorKind::ToolExecution);
    Ok(())
}
