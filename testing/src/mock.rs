use async_trait::async_trait;
use mockall::mock;
use owdcore::{
    error::DeployError,
    result::DeployResult,
    workspace::WorkspaceState,
};
use std::path::Path;

mock! {
    pub Fetcher {}

    #[async_trait]
    impl owdrepo::fetcher::Fetcher for Fetcher {
        async fn fetch(
            &self,
            git_url: &str,
            repo_dir: &Path,
        ) -> Result<(), DeployError>;
    }
}

mock! {
    pub Invoker {}

    #[async_trait]
    impl owdtool::invoker::Invoker for Invoker {
        async fn deploy(
            &self,
            workspace: &WorkspaceState,
        ) -> Result<DeployResult, DeployError>;
    }
}
