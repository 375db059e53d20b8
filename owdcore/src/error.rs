use serde_json::{
    Map,
    Value,
};
use std::{
    fmt,
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

/// Hint attached to output where the deployment tool reported an error
/// of its own.
pub const DESCRIPTIVE_ERROR: &str = "Could not successfully run \
    wskdeploy. Please run again with the verbose flag, -v.";

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("{stage} did not complete within {} seconds", seconds(.limit))]
    Timeout {
        stage: Stage,
        limit: Duration,
    },
    #[error("unable to remove working copy {path:?}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, PartialEq, Error)]
pub enum InputError {
    #[error("Please enter the GitHub repo url in params")]
    MissingGitUrl,
    #[error("unable to derive a repository name from `{0}`")]
    InvalidGitUrl(String),
    #[error("manifest path `{0}` must be relative to the repository root")]
    InvalidManifestPath(String),
}

#[derive(Debug, PartialEq, Error)]
pub enum RepositoryError {
    /// The remote could not be reached, or it does not hold a repository.
    #[error("There was a problem fetching <{url}>. Does the repository \
             exist and is the url correct? {msg}")]
    Remote {
        url: String,
        msg: String,
    },
    /// The local working copy or its filesystem misbehaved.
    #[error("working copy {path:?}: {msg}")]
    Local {
        path: PathBuf,
        msg: String,
    },
    #[error("working copy {0:?} already exists")]
    AlreadyExists(PathBuf),
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("error loading {path:?} to edit the package name: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error converting {path:?} to structured data: {msg}")]
    Parse {
        path: PathBuf,
        msg: String,
    },
    #[error("error saving new manifest file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error loading {0:?}. Does a manifest file exist?")]
    Missing(PathBuf),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("error running `{bin:?}`: {source}")]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{bin:?}` exited with {}: {stderr}", exit_description(.code))]
    Failed {
        bin: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
    /// The tool exited normally but its output carried an `error`.
    #[error("deployment tool reported an error: {0}")]
    Reported(Value),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Deploy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "repository fetch",
            Stage::Deploy => "deployment",
        })
    }
}

fn seconds(limit: &Duration) -> u64 {
    limit.as_secs()
}

fn exit_description(code: &Option<i32>) -> String {
    code.map(|c| format!("code {c}"))
        .unwrap_or_else(|| "a signal".to_string())
}

/// Flattened classification of a `DeployError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    RepositoryAccess,
    FileAccess,
    ManifestParse,
    ManifestMissing,
    ToolExecution,
    ToolReported,
    Timeout,
    Cleanup,
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Input(_) => ErrorKind::InputValidation,
            DeployError::Repository(_) => ErrorKind::RepositoryAccess,
            DeployError::Manifest(ManifestError::Parse { .. }) => ErrorKind::ManifestParse,
            DeployError::Manifest(ManifestError::Missing(_)) => ErrorKind::ManifestMissing,
            DeployError::Manifest(_) => ErrorKind::FileAccess,
            DeployError::Tool(ToolError::Reported(_)) => ErrorKind::ToolReported,
            DeployError::Tool(_) => ErrorKind::ToolExecution,
            DeployError::Timeout { .. } => ErrorKind::Timeout,
            DeployError::Cleanup { .. } => ErrorKind::Cleanup,
        }
    }

    /// The value handed back to the caller in place of a `DeployResult`.
    ///
    /// Output reported by the tool itself is passed through as is (it
    /// already carries the `descriptiveError` hint); everything else is
    /// wrapped as `{"error": <message>}`.
    pub fn payload(&self) -> Value {
        match self {
            DeployError::Tool(ToolError::Reported(value)) => value.clone(),
            _ => {
                let mut map = Map::new();
                map.insert("error".to_string(), Value::String(self.to_string()));
                Value::Object(map)
            }
        }
    }
}
