use async_trait::async_trait;
use drprune_model::{ContainerSummary, ExecOutput};
use tokio_util::sync::CancellationToken;

use crate::ports::PortError;

/// Local container runtime hosting the registry.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn containers(&self) -> Result<Vec<ContainerSummary>, PortError>;

    /// Run `argv` inside the container and wait for it, capturing stdout and stderr.
    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, PortError>;
}
