use std::sync::Arc;

use anyhow::Context;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use drprune_client::{ConsulKv, NomadClient, RegistryClient};
use drprune_core::{ClusterGc, ConfigResolver, GarbageCollector, LogCtx, Pruner, RuntimeGc};
use drprune_exec::DockerCli;

use crate::cli::{Cli, GcBackend};

/// Prune (unless skipped), then garbage-collect (if requested).
pub async fn run(cli: &Cli, cancel: &CancellationToken) -> anyhow::Result<()> {
    let log = LogCtx::new().with("app", "drprune");

    if cli.skip_deletes {
        info!(ctx = %log, "skipping deletes");
    } else {
        prune(cli, &log, cancel).await?;
    }

    if cli.run_gc {
        collect_garbage(cli, &log, cancel).await?;
    }
    Ok(())
}

async fn prune(cli: &Cli, log: &LogCtx, cancel: &CancellationToken) -> anyhow::Result<()> {
    let registry = RegistryClient::new(cli.registry_config()).context("registry client")?;
    let store = ConsulKv::new(cli.consul_config()).context("consul client")?;

    let resolver = ConfigResolver::load(Arc::new(store), cli.resolver_config(), log).await;
    let report = Pruner::new(Arc::new(registry), resolver)
        .run(OffsetDateTime::now_utc(), log, cancel)
        .await?;

    info!(
        ctx = %log,
        repositories = report.repositories,
        skipped_repositories = report.skipped_repositories,
        skipped_tags = report.skipped_tags,
        shared_digests = report.shared_digests,
        candidates = report.candidates,
        deleted = report.deletion.deleted,
        failed = report.deletion.failed.len(),
        "pruning finished"
    );
    Ok(())
}

async fn collect_garbage(cli: &Cli, log: &LogCtx, cancel: &CancellationToken) -> anyhow::Result<()> {
    let collector: Box<dyn GarbageCollector> = match cli.gc_backend {
        GcBackend::Nomad => {
            let nomad = NomadClient::new(cli.nomad_config()).context("nomad client")?;
            Box::new(ClusterGc::new(Arc::new(nomad), cli.cluster_gc_config()))
        }
        GcBackend::Docker => Box::new(RuntimeGc::new(
            Arc::new(DockerCli::default()),
            cli.runtime_gc_config(),
        )),
    };

    let report = collector.run(log, cancel).await?;
    let failed = report.failures().count();
    if failed > 0 {
        warn!(ctx = %log, failed, total = report.outcomes.len(), "garbage collection failed on some targets");
    }
    Ok(())
}
