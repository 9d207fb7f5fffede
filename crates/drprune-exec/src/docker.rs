//! Local container runtime driven through the `docker` CLI.
use async_trait::async_trait;
use drprune_core::{ContainerRuntime, PortError};
use drprune_model::{ContainerSummary, ExecOutput};
use tokio_util::sync::CancellationToken;

use crate::{ExecError, ExecResult, ProcConfig, run};

const PS_FORMAT: &str = "{{.ID}}\t{{.Names}}";

#[derive(Clone, Debug)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            binary: "docker".into(),
        }
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn list_command(&self) -> ProcConfig {
        ProcConfig::new(&self.binary, ["ps", "--no-trunc", "--format", PS_FORMAT])
    }

    fn exec_command(&self, container_id: &str, argv: &[String]) -> ProcConfig {
        let args = ["exec".to_string(), container_id.to_string()]
            .into_iter()
            .chain(argv.iter().cloned());
        ProcConfig::new(&self.binary, args)
    }
}

/// Parse `docker ps --format '{{.ID}}\t{{.Names}}'` output.
fn parse_ps(output: &str) -> ExecResult<Vec<ContainerSummary>> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let (id, names) = line
                .split_once('\t')
                .ok_or_else(|| ExecError::Output(format!("unexpected docker ps line: {line:?}")))?;
            Ok(ContainerSummary::new(
                id.trim(),
                names.split(',').map(str::trim).filter(|n| !n.is_empty()),
            ))
        })
        .collect()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn containers(&self) -> Result<Vec<ContainerSummary>, PortError> {
        let out = run(&self.list_command(), &CancellationToken::new()).await?;
        if !out.success() {
            return Err(PortError::Exec(format!(
                "docker ps exited with {}: {}",
                out.exit_code,
                out.stderr.trim_end()
            )));
        }
        Ok(parse_ps(&out.stdout)?)
    }

    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, PortError> {
        Ok(run(&self.exec_command(container_id, argv), cancel).await?)
    }
}
