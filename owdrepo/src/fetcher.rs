use async_trait::async_trait;
use git2::{
    build::{
        CheckoutBuilder,
        RepoBuilder,
    },
    ErrorClass,
    ErrorCode,
    FetchOptions,
    RemoteCallbacks,
    Repository,
};
use owdcore::{
    error::{
        DeployError,
        RepositoryError,
        Stage,
    },
    workspace::SyncPolicy,
};
use std::{
    fs,
    io,
    path::Path,
    time::{
        Duration,
        Instant,
    },
};
use tokio::task;

#[async_trait]
pub trait Fetcher {
    /// Ensure `repo_dir` holds a working copy of the default branch of
    /// the repository at `git_url`.
    async fn fetch(
        &self,
        git_url: &str,
        repo_dir: &Path,
    ) -> Result<(), DeployError>;
}

/// Fetcher backed by libgit2.
#[derive(Clone, Debug, Default)]
pub struct GitFetcher {
    policy: SyncPolicy,
    timeout: Option<Duration>,
}

impl GitFetcher {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            timeout: None,
        }
    }

    pub fn timeout(mut self, value: Option<Duration>) -> Self {
        self.timeout = value;
        self
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }
}

#[async_trait]
impl Fetcher for GitFetcher {
    async fn fetch(
        &self,
        git_url: &str,
        repo_dir: &Path,
    ) -> Result<(), DeployError> {
        let policy = self.policy;
        let limit = self.timeout;
        let deadline = limit.map(|limit| Instant::now() + limit);
        let remote_url = git_url.to_owned();
        let target = repo_dir.to_path_buf();

        // libgit2 blocks; keep it off the async workers.
        let outcome = task::spawn_blocking(move || match policy {
            SyncPolicy::Sync => fetch_or_clone(&target, &remote_url, deadline),
            SyncPolicy::Fresh => shallow_clone(&target, &remote_url, deadline),
        })
            .await
            .map_err(|e| local(repo_dir, format!("fetch task failed: {e}")))?;

        match outcome {
            Ok(()) => Ok(()),
            Err(error::FetchClone::Expired) => Err(DeployError::Timeout {
                stage: Stage::Fetch,
                limit: limit.unwrap_or_default(),
            }),
            Err(error::FetchClone::Repository(e)) => Err(e.into()),
        }
    }
}

fn local(path: &Path, msg: impl ToString) -> RepositoryError {
    RepositoryError::Local {
        path: path.to_path_buf(),
        msg: msg.to_string(),
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |deadline| Instant::now() >= deadline)
}

// returning false from a progress callback makes libgit2 abort the
// transfer with ErrorCode::User.
fn fetch_options<'a>(deadline: Option<Instant>) -> FetchOptions<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |_| !expired(deadline));
    callbacks.sideband_progress(move |_| !expired(deadline));
    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

fn is_local(e: &git2::Error, repo_dir: &Path) -> bool {
    match e.class() {
        ErrorClass::Checkout | ErrorClass::Filesystem | ErrorClass::Index => true,
        ErrorClass::Os | ErrorClass::Odb | ErrorClass::Repository => {
            e.message().contains(&*repo_dir.to_string_lossy())
        }
        _ => false,
    }
}

/// Whether `url` is served by the local transport, which has no
/// support for shallow fetches.
pub fn is_local_url(url: &str) -> bool {
    if url.starts_with("file://") {
        return true;
    }
    if url.contains("://") {
        return false;
    }
    // `host:path` is the scp-like ssh syntax unless a `/` comes first.
    match url.find(':') {
        Some(colon) => url[..colon].contains('/'),
        None => true,
    }
}

fn classify(
    e: git2::Error,
    remote_url: &str,
    repo_dir: &Path,
    deadline: Option<Instant>,
) -> error::FetchClone {
    if e.code() == ErrorCode::User && expired(deadline) {
        error::FetchClone::Expired
    }
    else if is_local(&e, repo_dir) {
        local(repo_dir, e.message()).into()
    }
    else {
        RepositoryError::Remote {
            url: remote_url.to_string(),
            msg: e.message().to_string(),
        }.into()
    }
}

/// Whether a working copy directory is present at `path`.
pub fn probe_dir(path: &Path) -> Result<bool, RepositoryError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(true),
        Ok(_) => Err(local(path, "exists but is not a directory")),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Directory {path:?} does not exist");
            Ok(false)
        }
        Err(e) => Err(local(path, format!("error checking if it exists: {e}"))),
    }
}

pub(crate) fn fetch_or_clone(
    repo_dir: &Path,
    remote_url: &str,
    deadline: Option<Instant>,
) -> Result<(), error::FetchClone> {
    info!("Syncing local {repo_dir:?} with remote <{remote_url}>...");
    if probe_dir(repo_dir)? {
        info!("Found existing working copy at {repo_dir:?}, pulling...");
        pull(repo_dir, deadline)
    }
    else {
        clone(remote_url, repo_dir, None, deadline)
    }
}

pub(crate) fn shallow_clone(
    repo_dir: &Path,
    remote_url: &str,
    deadline: Option<Instant>,
) -> Result<(), error::FetchClone> {
    if probe_dir(repo_dir)? {
        return Err(RepositoryError::AlreadyExists(repo_dir.to_path_buf()).into());
    }
    let depth = if is_local_url(remote_url) {
        info!("Shallow fetch is not available for local <{remote_url}>, cloning in full");
        None
    }
    else {
        Some(1)
    };
    clone(remote_url, repo_dir, depth, deadline)
}

fn clone(
    remote_url: &str,
    repo_dir: &Path,
    depth: Option<i32>,
    deadline: Option<Instant>,
) -> Result<(), error::FetchClone> {
    if let Some(parent) = repo_dir.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| local(parent, format!("unable to create directory: {e}")))?;
    }
    // libgit2 accepts an existing empty directory as the clone target.
    fs::create_dir(repo_dir)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => {
                RepositoryError::AlreadyExists(repo_dir.to_path_buf())
            }
            _ => local(repo_dir, format!("unable to create directory: {e}")),
        })?;
    info!("Cloning <{remote_url}> into {repo_dir:?}...");
    let mut options = fetch_options(deadline);
    if let Some(depth) = depth {
        options.depth(depth);
    }
    let mut builder = RepoBuilder::new();
    builder.fetch_options(options);
    match builder.clone(remote_url, repo_dir) {
        Ok(_) => {
            info!("Repository cloned");
            Ok(())
        }
        Err(e) => {
            match fs::remove_dir_all(repo_dir) {
                Err(cleanup) if cleanup.kind() != io::ErrorKind::NotFound => {
                    warn!("unable to remove partial clone {repo_dir:?}: {cleanup}");
                }
                _ => (),
            }
            Err(classify(e, remote_url, repo_dir, deadline))
        }
    }
}

fn pull(
    repo_dir: &Path,
    deadline: Option<Instant>,
) -> Result<(), error::FetchClone> {
    let repo = Repository::open(repo_dir)
        .map_err(|e| local(repo_dir, format!("unable to open: {}", e.message())))?;
    let mut remote = repo.find_remote("origin")
        .map_err(|e| local(repo_dir, e.message()))?;
    let remote_url = remote.url()
        .unwrap_or("origin")
        .to_string();
    // an empty refspec list uses the configured refspecs of the remote.
    remote.fetch(&[] as &[&str], Some(&mut fetch_options(deadline)), None)
        .map_err(|e| classify(e, &remote_url, repo_dir, deadline))?;
    fast_forward(&repo, repo_dir)?;
    Ok(())
}

fn fast_forward(
    repo: &Repository,
    repo_dir: &Path,
) -> Result<(), RepositoryError> {
    let fail = |e: git2::Error| local(repo_dir, e.message());
    let head = repo.head().map_err(fail)?;
    if !head.is_branch() {
        return Err(local(repo_dir, "HEAD is detached, unable to pull"));
    }
    let head_name = head.name()
        .ok_or_else(|| local(repo_dir, "HEAD is not valid utf-8"))?
        .to_string();
    let branch = head.shorthand()
        .ok_or_else(|| local(repo_dir, "HEAD is not valid utf-8"))?
        .to_string();

    let upstream = repo.find_reference(&format!("refs/remotes/origin/{branch}"))
        .map_err(fail)?;
    let incoming = repo.reference_to_annotated_commit(&upstream)
        .map_err(fail)?;
    let (analysis, _) = repo.merge_analysis(&[&incoming])
        .map_err(fail)?;

    if analysis.is_up_to_date() {
        info!("Working copy {repo_dir:?} is up to date");
    }
    else if analysis.is_fast_forward() {
        info!("Fast-forwarding `{branch}` to {}", incoming.id());
        repo.find_reference(&head_name)
            .map_err(fail)?
            .set_target(incoming.id(), "pull: fast-forward")
            .map_err(fail)?;
        repo.set_head(&head_name)
            .map_err(fail)?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))
            .map_err(fail)?;
    }
    else {
        return Err(local(
            repo_dir,
            format!("branch `{branch}` has diverged from origin"),
        ));
    }
    Ok(())
}

pub(crate) mod error {
    use owdcore::error::RepositoryError;

    pub(crate) enum FetchClone {
        Repository(RepositoryError),
        Expired,
    }

    impl From<RepositoryError> for FetchClone {
        fn from(e: RepositoryError) -> Self {
            FetchClone::Repository(e)
        }
    }
}
