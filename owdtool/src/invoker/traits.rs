use async_trait::async_trait;
use owdcore::{
    error::DeployError,
    result::DeployResult,
    workspace::WorkspaceState,
};

#[async_trait]
pub trait Invoker {
    async fn deploy(
        &self,
        workspace: &WorkspaceState,
    ) -> Result<DeployResult, DeployError>;
}
