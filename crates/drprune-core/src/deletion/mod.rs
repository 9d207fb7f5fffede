//! Best-effort deletion of the candidate set.
use std::{collections::BTreeSet, sync::Arc};

use drprune_model::DeletionCandidate;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{CoreError, LogCtx, ports::RegistryApi};

/// Summary of a deletion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub attempted: usize,
    pub deleted: usize,
    pub failed: Vec<(DeletionCandidate, String)>,
}

impl DeletionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes manifests one at a time, oldest first.
///
/// A failed delete is logged and recorded; the remaining candidates are still attempted.
/// Nothing is retried.
pub struct DeletionExecutor {
    registry: Arc<dyn RegistryApi>,
}

impl DeletionExecutor {
    pub fn new(registry: Arc<dyn RegistryApi>) -> Self {
        Self { registry }
    }

    /// Delete every candidate. The set is ordered by creation time, so iteration is oldest-first.
    ///
    /// Returns [`CoreError::Cancelled`] if `cancel` fires between two deletions.
    pub async fn execute(
        &self,
        candidates: BTreeSet<DeletionCandidate>,
        log: &LogCtx,
        cancel: &CancellationToken,
    ) -> Result<DeletionReport, CoreError> {
        let total = candidates.len();
        let mut report = DeletionReport::default();

        for (i, candidate) in candidates.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let log = log
                .with("repo", &candidate.repo)
                .with("tag", &candidate.tag)
                .with("digest", &candidate.digest);

            info!(
                target: "drprune::deletion",
                ctx = %log,
                progress = %format_args!("{} of {}", i + 1, total),
                created = %candidate.created_at,
                "deleting"
            );

            report.attempted += 1;
            match self
                .registry
                .delete_manifest(&candidate.repo, &candidate.digest)
                .await
            {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    error!(target: "drprune::deletion", ctx = %log, error = %e, "error deleting manifest");
                    report.failed.push((candidate, e.to_string()));
                }
            }
        }

        info!(
            target: "drprune::deletion",
            ctx = %log,
            attempted = report.attempted,
            deleted = report.deleted,
            failed = report.failed.len(),
            "deletion pass finished"
        );
        Ok(report)
    }
}
