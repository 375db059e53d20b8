use async_trait::async_trait;
use owdcore::{
    error::{
        DESCRIPTIVE_ERROR,
        DeployError,
        ManifestError,
        Stage,
        ToolError,
    },
    result::DeployResult,
    workspace::WorkspaceState,
};
use serde_json::Value;
use std::{
    io,
    path::{
        Path,
        PathBuf,
    },
    process::{
        Output,
        Stdio,
    },
    time::Duration,
};
use tokio::{
    fs,
    io::AsyncWriteExt,
    process::Command,
    time,
};

use super::{
    traits,
    types::*,
};

impl WskDeploy {
    pub fn new(bin_path: impl Into<PathBuf>) -> Self {
        Self {
            bin_path: bin_path.into(),
            timeout: None,
        }
    }

    pub fn timeout(mut self, value: Option<Duration>) -> Self {
        self.timeout = value;
        self
    }

    pub fn bin_path(&self) -> &Path {
        &self.bin_path
    }

    /// Build the command for a single invocation against `workspace`.
    pub fn command(&self, workspace: &WorkspaceState) -> Command {
        let mut command = Command::new(&self.bin_path);
        command
            .current_dir(workspace.manifest_dir())
            .arg("-v")
            .arg("-m")
            .arg(&workspace.manifest_file_name);
        match &workspace.credentials.auth {
            Some(auth) => { command.arg("--auth").arg(auth); }
            None => log::warn!("no auth token resolved, omitting --auth"),
        }
        match &workspace.credentials.api_host {
            Some(api_host) => { command.arg("--apihost").arg(api_host); }
            None => log::warn!("no api host resolved, omitting --apihost"),
        }
        if let Some(env_data) = &workspace.env_data {
            command.envs(env_data);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, workspace: &WorkspaceState) -> Result<Output, ToolError> {
        let spawn_error = |source: io::Error| ToolError::Spawn {
            bin: self.bin_path.clone(),
            source,
        };
        let mut child = self.command(workspace)
            .spawn()
            .map_err(spawn_error)?;
        log::trace!("spawned {:?} as pid {:?}", self.bin_path, child.id());

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(CONFIRMATION).await {
                Ok(()) => (),
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    log::debug!("tool exited before reading the confirmation");
                }
                Err(e) => return Err(spawn_error(e)),
            }
            // stdin is closed on drop so the tool sees end of input.
        }

        child.wait_with_output()
            .await
            .map_err(spawn_error)
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map_or(true, |n| n != 0.0),
        Some(_) => true,
    }
}

/// Interpret the finished output of the deployment tool.
pub fn interpret(bin: &Path, output: &Output) -> Result<DeployResult, ToolError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        return Err(ToolError::Failed {
            bin: bin.to_path_buf(),
            code: output.status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    if !stdout.trim().is_empty() {
        log::info!("stdout from wskdeploy: {stdout}");
        match serde_json::from_str::<Value>(&stdout) {
            Ok(Value::Object(mut map)) if is_truthy(map.get("error")) => {
                map.insert(
                    "descriptiveError".to_string(),
                    Value::String(DESCRIPTIVE_ERROR.to_string()),
                );
                return Err(ToolError::Reported(Value::Object(map)));
            }
            Ok(_) => (),
            Err(_) => log::debug!("failed to parse stdout, it wasn't a JSON object"),
        }
    }

    if !stderr.trim().is_empty() {
        log::warn!("stderr from wskdeploy: {stderr}");
    }

    log::info!("deployment finished");
    Ok(DeployResult::success())
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

#[async_trait]
impl traits::Invoker for WskDeploy {
    async fn deploy(
        &self,
        workspace: &WorkspaceState,
    ) -> Result<DeployResult, DeployError> {
        let manifest = workspace.manifest_file();
        if !is_file(&manifest).await {
            return Err(ManifestError::Missing(manifest).into());
        }
        log::info!("deploying {manifest:?} with {:?}", self.bin_path);

        let output = match self.timeout {
            Some(limit) => time::timeout(limit, self.run(workspace))
                .await
                .map_err(|_| DeployError::Timeout {
                    stage: Stage::Deploy,
                    limit,
                })??,
            None => self.run(workspace).await?,
        };
        Ok(interpret(&self.bin_path, &output)?)
    }
}

#[cfg(all(test, unix))]
mod test {
    use owdcore::error::ToolError;
    use serde_json::json;
    use std::{
        os::unix::process::ExitStatusExt,
        path::Path,
        process::{
            ExitStatus,
            Output,
        },
    };
    use super::*;

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            // wait status, exit code lives in the second byte.
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn interpret_success() {
        let bin = Path::new("wskdeploy");
        assert_eq!(interpret(bin, &output(0, "", "")).ok(), Some(DeployResult::success()));
        assert!(interpret(bin, &output(0, "Deployment completed", "")).is_ok());
        assert!(interpret(bin, &output(0, r#"{"status": "ok"}"#, "a warning")).is_ok());
        assert!(interpret(bin, &output(0, r#"{"error": null}"#, "")).is_ok());
        assert!(interpret(bin, &output(0, r#"{"error": ""}"#, "")).is_ok());
        assert!(interpret(bin, &output(0, r#"["error"]"#, "")).is_ok());
    }

    #[test]
    fn interpret_reported() {
        let bin = Path::new("wskdeploy");
        match interpret(bin, &output(0, r#"{"error": "no such namespace"}"#, "")) {
            Err(ToolError::Reported(value)) => assert_eq!(value, json!({
                "error": "no such namespace",
                "descriptiveError": DESCRIPTIVE_ERROR,
            })),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn interpret_failed() {
        let bin = Path::new("wskdeploy");
        match interpret(bin, &output(1, r#"{"error": "ignored"}"#, "bad auth\n")) {
            Err(ToolError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "bad auth");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truthy() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(is_truthy(Some(&json!(1))));
        assert!(is_truthy(Some(&json!({}))));
        assert!(is_truthy(Some(&json!("x"))));
    }
}
