use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    env,
    fmt,
    path::{
        Component,
        Path,
    },
};

use crate::error::InputError;

pub const DEFAULT_MANIFEST_PATH: &str = ".";
pub const API_HOST_ENV: &str = "__OW_API_HOST";
pub const API_KEY_ENV: &str = "__OW_API_KEY";
/// The `envData` key that requests a renamed package.
pub const PACKAGE_NAME_KEY: &str = "PACKAGE_NAME";

pub type EnvData = BTreeMap<String, String>;

/// A single invocation record, as received from the caller.
///
/// Every field is optional here so that a missing `gitUrl` surfaces as
/// an `InputError` from `resolve` rather than as a deserialization error.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_data: Option<EnvData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wsk_api_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wsk_auth: Option<String>,
}

#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    pub api_host: Option<String>,
    pub auth: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRequest {
    pub git_url: String,
    pub manifest_path: String,
    pub env_data: Option<EnvData>,
    pub credentials: Credentials,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_host", &self.api_host)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl DeployRequest {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ResolvedRequest, InputError> {
        self.resolve_with(|key| env::var(key).ok())
    }

    /// Resolve using `lookup` for the credential fallbacks.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ResolvedRequest, InputError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let git_url = non_empty(self.git_url)
            .ok_or(InputError::MissingGitUrl)?;
        let manifest_path = non_empty(self.manifest_path)
            .unwrap_or_else(|| DEFAULT_MANIFEST_PATH.to_string());
        validate_manifest_path(&manifest_path)?;

        let credentials = Credentials {
            api_host: non_empty(self.wsk_api_host)
                .or_else(|| non_empty(lookup(API_HOST_ENV))),
            auth: non_empty(self.wsk_auth)
                .or_else(|| non_empty(lookup(API_KEY_ENV))),
        };
        log::info!(
            "using api host {:?} (auth token {})",
            credentials.api_host,
            if credentials.auth.is_some() { "present" } else { "absent" },
        );

        Ok(ResolvedRequest {
            git_url,
            manifest_path,
            env_data: self.env_data,
            credentials,
        })
    }
}

fn validate_manifest_path(manifest_path: &str) -> Result<(), InputError> {
    let path = Path::new(manifest_path);
    let escapes = path.components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        Err(InputError::InvalidManifestPath(manifest_path.to_string()))
    }
    else {
        Ok(())
    }
}

impl ResolvedRequest {
    /// Name of the local working copy, taken from the last path segment
    /// of the url.
    pub fn repo_name(&self) -> Result<&str, InputError> {
        self.git_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .ok_or_else(|| InputError::InvalidGitUrl(self.git_url.clone()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_git_url() {
        assert_eq!(
            DeployRequest::default().resolve_with(no_env),
            Err(InputError::MissingGitUrl),
        );
        let request = DeployRequest {
            git_url: Some("".to_string()),
            .. Default::default()
        };
        assert_eq!(request.resolve_with(no_env), Err(InputError::MissingGitUrl));
    }

    #[test]
    fn manifest_path_default() -> anyhow::Result<()> {
        let request = DeployRequest::from_json(
            r#"{"gitUrl": "https://github.com/example/blueprint"}"#)?;
        let resolved = request.resolve_with(no_env)?;
        assert_eq!(resolved.manifest_path, ".");
        assert_eq!(resolved.env_data, None);
        Ok(())
    }

    #[test]
    fn manifest_path_escape() {
        for path in ["/etc", "../elsewhere", "runtimes/../../up"] {
            let request = DeployRequest {
                git_url: Some("https://github.com/example/blueprint".into()),
                manifest_path: Some(path.into()),
                .. Default::default()
            };
            assert_eq!(
                request.resolve_with(no_env),
                Err(InputError::InvalidManifestPath(path.into())),
            );
        }
    }

    #[test]
    fn credentials_explicit_over_env() -> anyhow::Result<()> {
        let request = DeployRequest::from_json(r#"{
            "gitUrl": "https://github.com/example/blueprint",
            "wskApiHost": "openwhisk.example.com",
            "wskAuth": ""
        }"#)?;
        let resolved = request.resolve_with(|key| match key {
            API_HOST_ENV => Some("env.example.com".to_string()),
            API_KEY_ENV => Some("abc:123".to_string()),
            _ => None,
        })?;
        assert_eq!(resolved.credentials, Credentials {
            api_host: Some("openwhisk.example.com".to_string()),
            auth: Some("abc:123".to_string()),
        });
        Ok(())
    }

    #[test]
    fn credentials_redacted() {
        let credentials = Credentials {
            api_host: Some("host".to_string()),
            auth: Some("secret".to_string()),
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn repo_name() -> anyhow::Result<()> {
        for (url, name) in [
            ("https://github.com/example/blueprint", "blueprint"),
            ("https://github.com/example/blueprint/", "blueprint"),
            ("https://github.com/example/blueprint.git", "blueprint.git"),
            ("blueprint", "blueprint"),
        ] {
            let request = DeployRequest {
                git_url: Some(url.into()),
                .. Default::default()
            }.resolve_with(no_env)?;
            assert_eq!(request.repo_name()?, name);
        }

        let request = DeployRequest {
            git_url: Some("https://github.com/..".into()),
            .. Default::default()
        }.resolve_with(no_env)?;
        assert!(request.repo_name().is_err());
        Ok(())
    }
}
