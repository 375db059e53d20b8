use owdcore::{
    error::ManifestError,
    request::EnvData,
    workspace::{
        DERIVED_MANIFEST_FILE_NAME,
        WorkspaceState,
    },
};
use serde_yaml::Value;
use tokio::fs;

/// Set `package.name` in the raw manifest document to `name`.
pub fn rename_package(raw: &str, name: &str) -> Result<String, String> {
    let mut document: Value = serde_yaml::from_str(raw)
        .map_err(|e| e.to_string())?;
    let package = document.get_mut("package")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| "manifest has no `package` mapping".to_string())?;
    package.insert(Value::from("name"), Value::from(name));
    serde_yaml::to_string(&document)
        .map_err(|e| e.to_string())
}

/// Apply the `PACKAGE_NAME` override carried by the workspace, if any.
///
/// The renamed manifest is written next to the original, which is left
/// as is, and the returned workspace points at the new file.  Without
/// an override the manifest is used unchanged and the environment data
/// is reset to an empty mapping.
pub async fn apply_package_name(
    mut workspace: WorkspaceState,
) -> Result<WorkspaceState, ManifestError> {
    let name = match workspace.package_name() {
        Some(name) => name.to_string(),
        None => {
            log::debug!("no package rename requested");
            workspace.env_data = Some(EnvData::new());
            return Ok(workspace);
        }
    };

    let source = workspace.manifest_file();
    let raw = fs::read_to_string(&source)
        .await
        .map_err(|e| ManifestError::Read {
            path: source.clone(),
            source: e,
        })?;
    let patched = rename_package(&raw, &name)
        .map_err(|msg| ManifestError::Parse {
            path: source.clone(),
            msg,
        })?;

    let target = workspace.manifest_dir().join(DERIVED_MANIFEST_FILE_NAME);
    fs::write(&target, patched)
        .await
        .map_err(|source| ManifestError::Write {
            path: target.clone(),
            source,
        })?;
    log::info!("renamed package to `{name}` in {target:?}");

    workspace.manifest_file_name = DERIVED_MANIFEST_FILE_NAME.to_string();
    Ok(workspace)
}
