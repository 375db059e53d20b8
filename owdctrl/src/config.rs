use anyhow::Context;
use clap::Parser;
use owdcore::{
    request::{
        DeployRequest,
        EnvData,
    },
    workspace::SyncPolicy,
};
use std::{
    env,
    fs,
    io::{
        self,
        Read,
    },
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

pub const WSKDEPLOY_BIN: &str = "wskdeploy";
pub const WORK_DIR: &str = "tmp";

#[derive(Debug, Parser)]
#[clap(version, about = "Deploy an OpenWhisk manifest from a git repository")]
pub struct Cli {
    /// JSON invocation record; `-` reads it from standard input.
    #[clap(short = 'p', long = "params", value_name = "FILE")]
    pub params: Option<PathBuf>,
    #[clap(long = "git-url")]
    pub git_url: Option<String>,
    #[clap(long = "manifest-path")]
    pub manifest_path: Option<String>,
    /// Added to the environment of the deployment tool.
    #[clap(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,
    #[clap(long = "wsk-api-host")]
    pub wsk_api_host: Option<String>,
    #[clap(long = "wsk-auth")]
    pub wsk_auth: Option<String>,
    #[clap(long, value_name = "OWDEPLOY_WORK_ROOT", env = "OWDEPLOY_WORK_ROOT")]
    pub work_root: Option<PathBuf>,
    #[clap(long, value_name = "OWDEPLOY_WSKDEPLOY", env = "OWDEPLOY_WSKDEPLOY")]
    pub wskdeploy: Option<PathBuf>,
    #[clap(long, value_enum, default_value_t = SyncPolicy::Sync)]
    pub policy: SyncPolicy,
    #[clap(long)]
    pub cleanup: bool,
    /// Limit in seconds applied to the fetch and to the deployment.
    #[clap(long, value_name = "OWDEPLOY_TIMEOUT", env = "OWDEPLOY_TIMEOUT")]
    pub timeout: Option<u64>,
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

// where the executable lives; the tool and the working copies default
// to being next to it.
fn install_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn read_params(path: &Path) -> anyhow::Result<DeployRequest> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        raw
    }
    else {
        fs::read_to_string(path)
            .with_context(|| format!("unable to read params from {path:?}"))?
    };
    DeployRequest::from_json(&raw)
        .with_context(|| format!("invalid params in {path:?}"))
}

impl Cli {
    /// The invocation record, with flags overriding the params file.
    pub fn request(&self) -> anyhow::Result<DeployRequest> {
        let mut request = match &self.params {
            Some(path) => read_params(path)?,
            None => DeployRequest::default(),
        };
        if let Some(git_url) = &self.git_url {
            request.git_url = Some(git_url.clone());
        }
        if let Some(manifest_path) = &self.manifest_path {
            request.manifest_path = Some(manifest_path.clone());
        }
        if let Some(wsk_api_host) = &self.wsk_api_host {
            request.wsk_api_host = Some(wsk_api_host.clone());
        }
        if let Some(wsk_auth) = &self.wsk_auth {
            request.wsk_auth = Some(wsk_auth.clone());
        }
        if !self.env.is_empty() {
            request.env_data
                .get_or_insert_with(EnvData::new)
                .extend(self.env.iter().cloned());
        }
        Ok(request)
    }

    pub fn work_root(&self) -> PathBuf {
        self.work_root
            .clone()
            .unwrap_or_else(|| install_dir().join(WORK_DIR))
    }

    pub fn wskdeploy(&self) -> PathBuf {
        self.wskdeploy
            .clone()
            .unwrap_or_else(|| install_dir().join(WSKDEPLOY_BIN))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// A fresh clone is never reused, so it is always removed.
    pub fn cleanup(&self) -> bool {
        self.cleanup || self.policy == SyncPolicy::Fresh
    }
}
