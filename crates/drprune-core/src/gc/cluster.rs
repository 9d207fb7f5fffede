use std::{fmt, sync::Arc};

use async_trait::async_trait;
use drprune_model::{ClusterJob, GcCommand, GcReport, GcTarget};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    LogCtx,
    gc::{GarbageCollector, GcError, ps},
    poll::{self, PollPolicy, PollStep},
    ports::{Indexed, PortError, SchedulerApi},
};

const NAME: &str = "cluster";

/// Steps of the cluster workflow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClusterStage {
    Fetched,
    Deregistered,
    ReadOnlyFlagSet,
    Redeployed,
    AllocationPending,
    AllocationRunning,
    ProcessDiscovered,
    GcIssued,
    Restored,
    Completed,
}

impl fmt::Display for ClusterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterStage::Fetched => "fetched",
            ClusterStage::Deregistered => "deregistered",
            ClusterStage::ReadOnlyFlagSet => "read-only-flag-set",
            ClusterStage::Redeployed => "redeployed",
            ClusterStage::AllocationPending => "allocation-pending",
            ClusterStage::AllocationRunning => "allocation-running",
            ClusterStage::ProcessDiscovered => "process-discovered",
            ClusterStage::GcIssued => "gc-issued",
            ClusterStage::Restored => "restored",
            ClusterStage::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterGcConfig {
    /// Scheduler job running the registry.
    pub job: String,
    pub poll: PollPolicy,
}

impl ClusterGcConfig {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

/// Runs the registry garbage collector inside the scheduler-managed registry job.
///
/// The job is redeployed with the read-only marker, the collector runs inside the new
/// allocation, and the job is redeployed again without the marker. The final redeploy
/// also happens when a step after the read-only redeploy fails.
pub struct ClusterGc {
    scheduler: Arc<dyn SchedulerApi>,
    cfg: ClusterGcConfig,
}

impl ClusterGc {
    pub fn new(scheduler: Arc<dyn SchedulerApi>, cfg: ClusterGcConfig) -> Self {
        Self { scheduler, cfg }
    }

    /// Deregister the job (purge) and register `job` in its place; returns the evaluation id.
    async fn redeploy(&self, job: &ClusterJob, log: &LogCtx) -> Result<String, GcError> {
        self.scheduler
            .deregister(&self.cfg.job, true)
            .await
            .map_err(|source| GcError::Scheduler {
                stage: ClusterStage::Deregistered,
                source,
            })?;
        stage(log, ClusterStage::Deregistered);

        self.scheduler
            .register(job)
            .await
            .map_err(|source| GcError::Scheduler {
                stage: ClusterStage::Redeployed,
                source,
            })
    }

    /// Deregister, then register the read-only copy.
    async fn redeploy_read_only(&self, read_only: &ClusterJob, log: &LogCtx) -> Result<String, GcError> {
        stage(log, ClusterStage::ReadOnlyFlagSet);
        let eval_id = self.redeploy(read_only, log).await?;
        stage(log, ClusterStage::Redeployed);
        Ok(eval_id)
    }

    /// Wait for the redeployed allocation and find the registry command inside it.
    async fn locate(
        &self,
        eval_id: &str,
        task: &str,
        log: &LogCtx,
        cancel: &CancellationToken,
    ) -> Result<(String, GcCommand), GcError> {
        let policy = &self.cfg.poll;
        let scheduler = &self.scheduler;

        stage(log, ClusterStage::AllocationPending);
        let alloc_id = poll::long_poll(policy, cancel, log, "evaluation allocations", |query| async move {
            let Indexed { value: allocs, last_index } = scheduler.eval_allocations(eval_id, query).await?;
            let step = match allocs.first() {
                Some(alloc) if alloc.client_status.is_running() => PollStep::Ready(alloc.id.clone()),
                Some(alloc) => {
                    debug!(target: "drprune::gc", alloc = %alloc.id, status = ?alloc.client_status, "allocation not running yet");
                    PollStep::Pending
                }
                None => PollStep::Pending,
            };
            Ok::<_, PortError>(Indexed::new(step, last_index))
        })
        .await?;

        let log = log.with("alloc", &alloc_id);
        let alloc_ref = alloc_id.as_str();
        poll::long_poll(policy, cancel, &log, "allocation", |query| async move {
            let Indexed { value: alloc, last_index } = scheduler.allocation(alloc_ref, query).await?;
            let step = match alloc {
                Some(alloc) if alloc.client_status.is_running() => PollStep::Ready(()),
                _ => PollStep::Pending,
            };
            Ok::<_, PortError>(Indexed::new(step, last_index))
        })
        .await?;
        stage(&log, ClusterStage::AllocationRunning);

        let listing = self
            .scheduler
            .exec(&alloc_id, task, &ps::ps_argv(), cancel)
            .await
            .map_err(|source| GcError::Exec { what: "ps", source })?;
        if !listing.success() {
            return Err(GcError::NonZeroExit {
                what: "ps",
                code: listing.exit_code,
            });
        }

        let records = ps::parse(&listing.stdout)?;
        let command = ps::find_gc_command(&records).ok_or(GcError::CommandNotFound)?;
        info!(
            target: "drprune::gc",
            ctx = %log,
            binary = %command.binary,
            config = %command.config_path,
            "registry process discovered"
        );
        stage(&log, ClusterStage::ProcessDiscovered);

        Ok((alloc_id, command))
    }

    /// Redeploy the original descriptor with the read-only marker removed.
    async fn restore(&self, original: &ClusterJob, log: &LogCtx) -> Result<(), GcError> {
        let job = original.with_read_only(false)?;
        self.redeploy(&job, log).await?;
        stage(log, ClusterStage::Restored);
        Ok(())
    }

    /// Restore after a failure, keeping the original error.
    async fn restore_after(&self, original: &ClusterJob, err: GcError, log: &LogCtx) -> GcError {
        warn!(target: "drprune::gc", ctx = %log, error = %err, "restoring read-write mode after failure");
        if let Err(restore_err) = self.restore(original, log).await {
            error!(target: "drprune::gc", ctx = %log, error = %restore_err, "failed to restore read-write mode");
        }
        err
    }
}

fn stage(log: &LogCtx, stage: ClusterStage) {
    debug!(target: "drprune::gc", ctx = %log, %stage, "stage reached");
}

#[async_trait]
impl GarbageCollector for ClusterGc {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn discover_target(
        &self,
        log: &LogCtx,
        cancel: &CancellationToken,
    ) -> Result<GcTarget, GcError> {
        let log = log.with("job", &self.cfg.job);

        let job = self
            .scheduler
            .job(&self.cfg.job)
            .await
            .map_err(|source| GcError::Scheduler {
                stage: ClusterStage::Fetched,
                source,
            })?
            .ok_or_else(|| GcError::JobNotFound(self.cfg.job.clone()))?;
        let task = job.primary_task_name()?.to_string();
        stage(&log, ClusterStage::Fetched);

        let read_only = job.with_read_only(true)?;
        let eval_id = match self.redeploy_read_only(&read_only, &log).await {
            Ok(eval_id) => eval_id,
            // The job is untouched until the deregister goes through.
            Err(
                err @ GcError::Scheduler {
                    stage: ClusterStage::Deregistered,
                    ..
                },
            ) => return Err(err),
            Err(err) => return Err(self.restore_after(&job, err, &log).await),
        };

        let log = log.with("eval", &eval_id);
        match self.locate(&eval_id, &task, &log, cancel).await {
            Ok((alloc_id, command)) => Ok(GcTarget::Allocation {
                job,
                alloc_id,
                task,
                command,
            }),
            Err(err) => Err(self.restore_after(&job, err, &log).await),
        }
    }

    async fn run_command(
        &self,
        target: &GcTarget,
        log: &LogCtx,
        cancel: &CancellationToken,
    ) -> Result<GcReport, GcError> {
        let GcTarget::Allocation {
            job,
            alloc_id,
            task,
            command,
        } = target
        else {
            return Err(GcError::UnsupportedTarget {
                collector: NAME,
                kind: target.kind(),
            });
        };
        let log = log.with("job", &self.cfg.job).with("alloc", alloc_id);

        info!(target: "drprune::gc", ctx = %log, argv = ?command.argv(), "running garbage collection");
        stage(&log, ClusterStage::GcIssued);
        let outcome = self
            .scheduler
            .exec(alloc_id, task, &command.argv(), cancel)
            .await;

        let gc_result = match outcome {
            Ok(out) if out.success() => Ok(out.exit_code),
            Ok(out) => Err(GcError::NonZeroExit {
                what: "garbage-collect",
                code: out.exit_code,
            }),
            Err(source) => Err(GcError::Exec {
                what: "garbage-collect",
                source,
            }),
        };

        let exit_code = match gc_result {
            Ok(code) => code,
            Err(err) => return Err(self.restore_after(job, err, &log).await),
        };

        self.restore(job, &log)
            .await
            .map_err(|e| GcError::Restore(Box::new(e)))?;
        stage(&log, ClusterStage::Completed);

        let mut report = GcReport::new(NAME);
        report.record_success(alloc_id.clone(), exit_code);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use drprune_model::{ClientStatus, ClusterJob, GcOutcome};
    use serde_json::json;

    use super::*;
    use crate::{gc::ps::PsParseError, poll::PollError, testing::FakeScheduler};

    fn job() -> ClusterJob {
        ClusterJob::from_value(json!({
            "ID": "docker-registry",
            "TaskGroups": [{
                "Name": "registry",
                "Tasks": [{ "Name": "registry", "Env": {} }]
            }]
        }))
    }

    fn gc(scheduler: &Arc<FakeScheduler>) -> ClusterGc {
        let cfg = ClusterGcConfig::new("docker-registry")
            .with_poll(PollPolicy::new(3, Duration::from_secs(1)));
        ClusterGc::new(scheduler.clone(), cfg)
    }

    fn restored(scheduler: &FakeScheduler) -> bool {
        scheduler
            .registered()
            .last()
            .is_some_and(|job| !job.is_read_only())
    }

    #[tokio::test]
    async fn runs_collector_in_read_only_allocation_and_restores() {
        let scheduler = Arc::new(FakeScheduler::new(job()));
        let report = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            scheduler.calls(),
            vec![
                "job docker-registry",
                "deregister docker-registry purge=true",
                "register read_only=true",
                "eval_allocations eval-1 index=0",
                "allocation alloc-1",
                "exec alloc-1/registry ps -o pid,comm,args",
                "exec alloc-1/registry registry garbage-collect /etc/docker/registry/config.yml",
                "deregister docker-registry purge=true",
                "register read_only=false",
            ]
        );
        assert_eq!(report.collector, "cluster");
        assert_eq!(
            report.outcomes.get("alloc-1"),
            Some(&GcOutcome::Succeeded { exit_code: 0 })
        );
        assert_eq!(scheduler.registered().last(), Some(&job()));
    }

    #[tokio::test]
    async fn waits_for_allocation_to_appear() {
        let scheduler = FakeScheduler::new(job());
        scheduler.eval_allocs.lock().unwrap().push_front(Vec::new());
        let scheduler = Arc::new(scheduler);

        gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        let polls: Vec<_> = scheduler
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("eval_allocations"))
            .collect();
        assert_eq!(
            polls,
            vec!["eval_allocations eval-1 index=0", "eval_allocations eval-1 index=1"]
        );
    }

    #[tokio::test]
    async fn missing_job_touches_nothing() {
        let mut scheduler = FakeScheduler::new(job());
        scheduler.job = None;
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GcError::JobNotFound(name) if name == "docker-registry"));
        assert_eq!(scheduler.calls(), vec!["job docker-registry"]);
    }

    #[tokio::test]
    async fn exhausted_poll_restores_read_write_mode() {
        let scheduler = FakeScheduler::new(job());
        *scheduler.eval_allocs.lock().unwrap() = [Vec::new()].into();
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GcError::Poll(PollError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(scheduler.registered().len(), 2);
        assert!(restored(&scheduler));
    }

    #[tokio::test]
    async fn allocation_never_running_restores_read_write_mode() {
        let mut scheduler = FakeScheduler::new(job());
        scheduler.alloc_status = ClientStatus::Pending;
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GcError::Poll(PollError::Exhausted { attempts: 3, .. })
        ));
        let polls = scheduler
            .calls()
            .into_iter()
            .filter(|c| c == "allocation alloc-1")
            .count();
        assert_eq!(polls, 3);
        assert!(scheduler.execs.lock().unwrap().is_empty());
        assert_eq!(scheduler.registered().len(), 2);
        assert!(restored(&scheduler));
    }

    #[tokio::test]
    async fn failed_deregister_leaves_job_alone() {
        let mut scheduler = FakeScheduler::new(job());
        scheduler.fail_deregister = true;
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GcError::Scheduler { stage: ClusterStage::Deregistered, .. }
        ));
        assert!(scheduler.registered().is_empty());
        assert_eq!(
            scheduler.calls(),
            vec!["job docker-registry", "deregister docker-registry purge=true"]
        );
    }

    #[tokio::test]
    async fn failing_ps_restores_read_write_mode() {
        let mut scheduler = FakeScheduler::new(job());
        scheduler.ps_exit = 127;
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GcError::NonZeroExit { what: "ps", code: 127 }));
        assert_eq!(scheduler.execs.lock().unwrap().len(), 1);
        assert_eq!(scheduler.registered().len(), 2);
        assert!(restored(&scheduler));
    }

    #[tokio::test]
    async fn malformed_ps_listing_restores_read_write_mode() {
        let mut scheduler = FakeScheduler::new(job());
        scheduler.ps_output = "PID   COMMAND          COMMAND
ps: unrecognized option
".into();
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GcError::Ps(PsParseError::InvalidLine { line: 2, .. })
        ));
        assert_eq!(scheduler.execs.lock().unwrap().len(), 1);
        assert_eq!(scheduler.registered().len(), 2);
        assert!(restored(&scheduler));
    }

    #[tokio::test]
    async fn unknown_registry_process_restores_read_write_mode() {
        let mut scheduler = FakeScheduler::new(job());
        scheduler.ps_output = "PID   COMMAND          COMMAND\n    1 nginx            nginx -g daemon off;\n".into();
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GcError::CommandNotFound));
        assert!(restored(&scheduler));
        assert_eq!(scheduler.execs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_collection_still_restores() {
        let mut scheduler = FakeScheduler::new(job());
        scheduler.gc_exit = 1;
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GcError::NonZeroExit { what: "garbage-collect", code: 1 }
        ));
        assert!(restored(&scheduler));
    }

    #[tokio::test]
    async fn failed_restore_is_fatal() {
        let mut scheduler = FakeScheduler::new(job());
        scheduler.fail_register_after = Some(1);
        let scheduler = Arc::new(scheduler);

        let err = gc(&scheduler)
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            GcError::Restore(inner) => assert!(matches!(
                *inner,
                GcError::Scheduler { stage: ClusterStage::Redeployed, .. }
            )),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(scheduler.registered().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_allocation_restores() {
        let scheduler = Arc::new(FakeScheduler::new(job()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = gc(&scheduler).run(&LogCtx::new(), &cancel).await.unwrap_err();

        assert!(matches!(err, GcError::Poll(PollError::Cancelled { .. })));
        assert!(restored(&scheduler));
    }

    #[tokio::test]
    async fn rejects_container_target() {
        let scheduler = Arc::new(FakeScheduler::new(job()));
        let target = GcTarget::Containers {
            containers: Vec::new(),
            command: GcCommand::new("registry", "/etc/docker/registry/config.yml"),
        };

        let err = gc(&scheduler)
            .run_command(&target, &LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GcError::UnsupportedTarget { collector: "cluster", kind: "containers" }
        ));
        assert!(scheduler.calls().is_empty());
    }

    #[test]
    fn stages_are_ordered() {
        assert!(ClusterStage::Fetched < ClusterStage::Redeployed);
        assert!(ClusterStage::GcIssued < ClusterStage::Restored);
        assert_eq!(ClusterStage::ReadOnlyFlagSet.to_string(), "read-only-flag-set");
    }
}
