use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    path::PathBuf,
};

use crate::request::{
    Credentials,
    EnvData,
    PACKAGE_NAME_KEY,
    ResolvedRequest,
};

pub const MANIFEST_FILE_NAME: &str = "manifest.yaml";
/// Written next to the original manifest when the package is renamed.
pub const DERIVED_MANIFEST_FILE_NAME: &str = "manifest-changed-name.yaml";

/// How the local working copy is brought up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    /// Pull into an existing working copy, clone when there is none.
    #[default]
    Sync,
    /// Shallow clone into a directory that must not exist yet.
    Fresh,
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncPolicy::Sync => "sync",
            SyncPolicy::Fresh => "fresh",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceState {
    pub repo_dir: PathBuf,
    /// Relative to `repo_dir`.
    pub manifest_path: PathBuf,
    pub manifest_file_name: String,
    pub credentials: Credentials,
    pub env_data: Option<EnvData>,
}

impl WorkspaceState {
    pub fn new(repo_dir: PathBuf, request: ResolvedRequest) -> Self {
        Self {
            repo_dir,
            manifest_path: request.manifest_path.into(),
            manifest_file_name: MANIFEST_FILE_NAME.to_string(),
            credentials: request.credentials,
            env_data: request.env_data,
        }
    }

    /// The directory holding the manifest; the deployment tool runs here.
    pub fn manifest_dir(&self) -> PathBuf {
        self.repo_dir.join(&self.manifest_path)
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.manifest_dir().join(&self.manifest_file_name)
    }

    pub fn package_name(&self) -> Option<&str> {
        self.env_data
            .as_ref()
            .and_then(|env| env.get(PACKAGE_NAME_KEY))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}
