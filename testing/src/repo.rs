use git2::{
    IndexAddOption,
    Oid,
    Repository,
    Signature,
};
use std::{
    fs,
    path::Path,
};
use tempfile::TempDir;

/// Create a non-bare repository in a fresh temporary directory holding
/// the provided files in its initial commit on the `main` branch.
pub fn source_repo(
    files: Vec<(&str, &str)>,
) -> anyhow::Result<(TempDir, Repository)> {
    let tempdir = tempfile::tempdir()?;
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(tempdir.path(), &opts)?;
    commit(&repo, files)?;
    Ok((tempdir, repo))
}

/// Write the files into the working tree of `repo` and commit them on
/// top of the current HEAD (if any).
pub fn commit(
    repo: &Repository,
    files: Vec<(&str, &str)>,
) -> anyhow::Result<Oid> {
    let workdir = repo.workdir()
        .ok_or_else(|| anyhow::anyhow!("repository has no working tree"))?;
    for (name, contents) in files.iter() {
        let path = workdir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = Signature::now("user", "user@example.com")?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None,
    };
    let parents = parent.iter().collect::<Vec<_>>();
    Ok(repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        "commit",
        &tree,
        &parents,
    )?)
}

/// The url to hand to a clone for the repository at `path`.
pub fn url(path: &Path) -> String {
    path.to_str()
        .expect("temporary paths are valid utf-8")
        .to_string()
}
