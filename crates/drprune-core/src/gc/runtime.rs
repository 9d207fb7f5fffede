use std::sync::Arc;

use async_trait::async_trait;
use drprune_model::{ContainerTarget, GcCommand, GcReport, GcTarget};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    LogCtx,
    gc::{GarbageCollector, GcError},
    ports::ContainerRuntime,
};

const NAME: &str = "runtime";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeGcConfig {
    /// Containers whose name starts with this prefix are collected.
    pub name_prefix: String,
    pub command: GcCommand,
}

impl RuntimeGcConfig {
    pub fn new(name_prefix: impl Into<String>, command: GcCommand) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            command,
        }
    }
}

/// Runs the registry garbage collector in every local container matching a name prefix.
///
/// Containers are handled independently: a failure in one is recorded in the report and
/// the remaining containers are still processed.
pub struct RuntimeGc {
    runtime: Arc<dyn ContainerRuntime>,
    cfg: RuntimeGcConfig,
}

impl RuntimeGc {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, cfg: RuntimeGcConfig) -> Self {
        Self { runtime, cfg }
    }
}

#[async_trait]
impl GarbageCollector for RuntimeGc {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn discover_target(
        &self,
        log: &LogCtx,
        _cancel: &CancellationToken,
    ) -> Result<GcTarget, GcError> {
        let containers = self
            .runtime
            .containers()
            .await
            .map_err(GcError::ListContainers)?;

        let matching: Vec<ContainerTarget> = containers
            .iter()
            .filter_map(|c| {
                c.name_matching(&self.cfg.name_prefix).map(|name| ContainerTarget {
                    id: c.id.clone(),
                    name: name.to_string(),
                })
            })
            .collect();

        if matching.is_empty() {
            warn!(
                target: "drprune::gc",
                ctx = %log,
                prefix = %self.cfg.name_prefix,
                listed = containers.len(),
                "no registry container found"
            );
        }

        Ok(GcTarget::Containers {
            containers: matching,
            command: self.cfg.command.clone(),
        })
    }

    async fn run_command(
        &self,
        target: &GcTarget,
        log: &LogCtx,
        cancel: &CancellationToken,
    ) -> Result<GcReport, GcError> {
        let GcTarget::Containers { containers, command } = target else {
            return Err(GcError::UnsupportedTarget {
                collector: NAME,
                kind: target.kind(),
            });
        };

        let argv = command.argv();
        let mut report = GcReport::new(NAME);

        for container in containers {
            if cancel.is_cancelled() {
                if !report.is_empty() {
                    warn!(
                        target: "drprune::gc",
                        ctx = %log,
                        done = report.outcomes.len(),
                        total = containers.len(),
                        "cancelled, reporting finished containers"
                    );
                    self.report_result(&report, log);
                }
                return Err(GcError::Cancelled);
            }
            let log = log
                .with("container", &container.name)
                .with("container_id", &container.id);
            info!(target: "drprune::gc", ctx = %log, argv = ?argv, "running garbage collection");

            match self.runtime.exec(&container.id, &argv, cancel).await {
                Ok(out) if out.success() => {
                    report.record_success(container.id.clone(), out.exit_code);
                }
                Ok(out) => {
                    error!(
                        target: "drprune::gc",
                        ctx = %log,
                        exit_code = out.exit_code,
                        stderr = %out.stderr.trim_end(),
                        "garbage collection exited with non-zero status"
                    );
                    report.record_failure(
                        container.id.clone(),
                        format!("exited with non-zero status {}", out.exit_code),
                    );
                }
                Err(e) => {
                    error!(target: "drprune::gc", ctx = %log, error = %e, "garbage collection could not be executed");
                    report.record_failure(container.id.clone(), e.to_string());
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use drprune_model::{ContainerSummary, ExecOutput, GcOutcome};

    use super::*;
    use crate::{ports::PortError, testing::FakeRuntime};

    fn cfg() -> RuntimeGcConfig {
        RuntimeGcConfig::new(
            "docker-registry",
            GcCommand::new("registry", "/etc/docker/registry/config.yml"),
        )
    }

    fn runtime(containers: Vec<ContainerSummary>) -> FakeRuntime {
        FakeRuntime {
            containers: Some(containers),
            ..FakeRuntime::default()
        }
    }

    #[tokio::test]
    async fn collects_only_matching_containers() {
        let fake = Arc::new(runtime(vec![
            ContainerSummary::new("c1", ["/docker-registry-1"]),
            ContainerSummary::new("c2", ["/nginx"]),
            ContainerSummary::new("c3", ["/docker-registry-2"]),
        ]));

        let report = RuntimeGc::new(fake.clone(), cfg())
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        let execs = fake.execs.lock().unwrap().clone();
        assert_eq!(
            execs.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
            vec!["c1", "c3"]
        );
        assert_eq!(
            execs[0].1,
            ["registry", "garbage-collect", "/etc/docker/registry/config.yml"]
        );
        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn one_failing_container_does_not_stop_the_others() {
        let mut fake = runtime(vec![
            ContainerSummary::new("c1", ["/docker-registry-1"]),
            ContainerSummary::new("c2", ["/docker-registry-2"]),
            ContainerSummary::new("c3", ["/docker-registry-3"]),
        ]);
        fake.results.insert(
            "c1".into(),
            Ok(ExecOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "configuration error\n".into(),
            }),
        );
        fake.results
            .insert("c2".into(), Err(PortError::Exec("no such container".into())));
        let fake = Arc::new(fake);

        let report = RuntimeGc::new(fake.clone(), cfg())
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fake.execs.lock().unwrap().len(), 3);
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 2);
        assert_eq!(
            report.outcomes.get("c3"),
            Some(&GcOutcome::Succeeded { exit_code: 0 })
        );
    }

    #[tokio::test]
    async fn no_match_yields_empty_report() {
        let fake = Arc::new(runtime(vec![ContainerSummary::new("c2", ["/nginx"])]));

        let report = RuntimeGc::new(fake.clone(), cfg())
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_empty());
        assert!(fake.execs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_failure_is_an_error() {
        let fake = Arc::new(FakeRuntime::default());

        let err = RuntimeGc::new(fake, cfg())
            .run(&LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GcError::ListContainers(PortError::Exec(_))));
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_container() {
        let fake = Arc::new(runtime(vec![ContainerSummary::new("c1", ["/docker-registry-1"])]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = RuntimeGc::new(fake.clone(), cfg())
            .run(&LogCtx::new(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, GcError::Cancelled));
        assert!(fake.execs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancellation_mid_run_keeps_finished_containers() {
        let mut fake = runtime(vec![
            ContainerSummary::new("c1", ["/docker-registry-1"]),
            ContainerSummary::new("c2", ["/docker-registry-2"]),
        ]);
        fake.cancel_on_exec = true;
        let fake = Arc::new(fake);
        let cancel = CancellationToken::new();

        let err = RuntimeGc::new(fake.clone(), cfg())
            .run(&LogCtx::new(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, GcError::Cancelled));
        assert!(cancel.is_cancelled());
        let execs = fake.execs.lock().unwrap();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0].0, "c1");
    }
}
