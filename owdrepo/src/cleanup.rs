use async_recursion::async_recursion;
use std::{
    io,
    path::{
        Path,
        PathBuf,
    },
};
use tokio::fs;

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

/// Remove the working copy at `path` along with everything under it.
///
/// A path that is already gone is not an error.  Symbolic links are
/// removed rather than followed.
pub async fn remove_working_copy(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("working copy {path:?} already absent");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    info!("Removing working copy {path:?}");
    remove_entry(path.to_path_buf(), meta.is_dir()).await
}

// post-order: every descendant goes before the directory holding it.
#[async_recursion]
async fn remove_entry(path: PathBuf, is_dir: bool) -> io::Result<()> {
    if !is_dir {
        return ignore_missing(fs::remove_file(&path).await);
    }
    let mut entries = match fs::read_dir(&path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        remove_entry(entry.path(), file_type.is_dir()).await?;
    }
    ignore_missing(fs::remove_dir(&path).await)
}
