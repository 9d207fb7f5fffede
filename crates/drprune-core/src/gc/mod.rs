//! Registry garbage-collection triggers.
//!
//! Two collectors share the [`GarbageCollector`] capability:
//! - [`ClusterGc`] redeploys the registry job read-only through the scheduler and runs the
//!   collector inside the new allocation;
//! - [`RuntimeGc`] runs the collector directly in matching local containers.

mod cluster;
pub use cluster::{ClusterGc, ClusterGcConfig, ClusterStage};

mod runtime;
pub use runtime::{RuntimeGc, RuntimeGcConfig};

pub mod ps;

mod error;
pub use error::GcError;

use async_trait::async_trait;
use drprune_model::{GcOutcome, GcReport, GcTarget};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::LogCtx;

#[async_trait]
pub trait GarbageCollector: Send + Sync {
    /// Short collector name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Locate where the collector has to run.
    async fn discover_target(
        &self,
        log: &LogCtx,
        cancel: &CancellationToken,
    ) -> Result<GcTarget, GcError>;

    /// Run the registry garbage collector against `target`.
    async fn run_command(
        &self,
        target: &GcTarget,
        log: &LogCtx,
        cancel: &CancellationToken,
    ) -> Result<GcReport, GcError>;

    /// Log the outcome of every target.
    fn report_result(&self, report: &GcReport, log: &LogCtx) {
        if report.is_empty() {
            warn!(target: "drprune::gc", ctx = %log, "garbage collection ran against no target");
            return;
        }
        for (id, outcome) in &report.outcomes {
            match outcome {
                GcOutcome::Succeeded { exit_code } => {
                    info!(target: "drprune::gc", ctx = %log, target_id = %id, exit_code, "garbage collection succeeded")
                }
                GcOutcome::Failed { reason } => {
                    error!(target: "drprune::gc", ctx = %log, target_id = %id, %reason, "garbage collection failed")
                }
            }
        }
    }

    /// Discover, run, report.
    async fn run(&self, log: &LogCtx, cancel: &CancellationToken) -> Result<GcReport, GcError> {
        let log = log.with("collector", self.name());
        let target = self.discover_target(&log, cancel).await?;
        info!(target: "drprune::gc", ctx = %log, kind = target.kind(), "target discovered");

        let report = self.run_command(&target, &log, cancel).await?;
        self.report_result(&report, &log);
        Ok(report)
    }
}
