use owdcore::{
    error::{
        DeployError,
        InputError,
        RepositoryError,
    },
    request::{
        DeployRequest,
        ResolvedRequest,
    },
    result::DeployResult,
    workspace::WorkspaceState,
};
use owdrepo::{
    cleanup::remove_working_copy,
    fetcher::Fetcher,
};
use owdtool::invoker::Invoker;
use std::path::{
    Path,
    PathBuf,
};

use crate::manifest::apply_package_name;

/// Fetch, patch, deploy and optionally clean up, one request at a time.
pub struct Pipeline<F, I> {
    fetcher: F,
    invoker: I,
    work_root: PathBuf,
    cleanup: bool,
}

impl<F, I> Pipeline<F, I>
where
    F: Fetcher + Send + Sync,
    I: Invoker + Send + Sync,
{
    pub fn new(
        fetcher: F,
        invoker: I,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            invoker,
            work_root: work_root.into(),
            cleanup: false,
        }
    }

    /// Remove the working copy once the deployment attempt is over.
    pub fn cleanup(mut self, value: bool) -> Self {
        self.cleanup = value;
        self
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn working_copy(
        &self,
        request: &ResolvedRequest,
    ) -> Result<PathBuf, InputError> {
        Ok(self.work_root.join(request.repo_name()?))
    }

    /// Deploy with credentials falling back to the process environment.
    pub async fn deploy(
        &self,
        request: DeployRequest,
    ) -> Result<DeployResult, DeployError> {
        self.run(request.resolve()?).await
    }

    pub async fn deploy_with<L>(
        &self,
        request: DeployRequest,
        lookup: L,
    ) -> Result<DeployResult, DeployError>
    where
        L: Fn(&str) -> Option<String>,
    {
        self.run(request.resolve_with(lookup)?).await
    }

    pub async fn run(
        &self,
        request: ResolvedRequest,
    ) -> Result<DeployResult, DeployError> {
        let repo_dir = self.working_copy(&request)?;
        let outcome = self.fetch_and_deploy(&repo_dir, request).await;
        if !self.cleanup {
            return outcome;
        }
        // a directory that was already there when a fresh clone was
        // requested belongs to someone else.
        if let Err(DeployError::Repository(RepositoryError::AlreadyExists(_))) = &outcome {
            return outcome;
        }

        match (outcome, remove_working_copy(&repo_dir).await) {
            (outcome, Ok(())) => outcome,
            (Ok(_), Err(source)) => Err(DeployError::Cleanup {
                path: repo_dir,
                source,
            }),
            (Err(e), Err(cleanup_error)) => {
                log::error!("unable to remove working copy {repo_dir:?}: {cleanup_error}");
                Err(e)
            }
        }
    }

    async fn fetch_and_deploy(
        &self,
        repo_dir: &Path,
        request: ResolvedRequest,
    ) -> Result<DeployResult, DeployError> {
        log::info!("fetching <{}> into {repo_dir:?}", request.git_url);
        self.fetcher.fetch(&request.git_url, repo_dir).await?;
        let workspace = apply_package_name(
            WorkspaceState::new(repo_dir.to_path_buf(), request)
        ).await?;
        log::debug!("manifest resolved to {:?}", workspace.manifest_file());
        self.invoker.deploy(&workspace).await
    }
}
