//! Pruning pipeline: policy resolution, tag collection, decision and deletion.
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use drprune_model::{DeletionCandidate, LATEST_TAG, TagRecord};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    CoreError, LogCtx,
    deletion::{DeletionExecutor, DeletionReport},
    policy::ConfigResolver,
    ports::RegistryApi,
    retention,
};

/// Outcome of one pruning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub repositories: usize,
    pub skipped_repositories: usize,
    pub skipped_tags: usize,
    /// Candidates kept because a retained tag points to the same manifest.
    pub shared_digests: usize,
    pub candidates: usize,
    pub deletion: DeletionReport,
}

pub struct Pruner {
    registry: Arc<dyn RegistryApi>,
    resolver: ConfigResolver,
    executor: DeletionExecutor,
}

impl Pruner {
    pub fn new(registry: Arc<dyn RegistryApi>, resolver: ConfigResolver) -> Self {
        let executor = DeletionExecutor::new(Arc::clone(&registry));
        Self {
            registry,
            resolver,
            executor,
        }
    }

    /// Collect the deletion candidates of every repository, then delete them.
    ///
    /// Only a failure to list repositories (or cancellation) aborts the run;
    /// tag-level problems are logged and skipped.
    #[instrument(level = "debug", skip_all)]
    pub async fn run(
        &self,
        now: OffsetDateTime,
        log: &LogCtx,
        cancel: &CancellationToken,
    ) -> Result<PruneReport, CoreError> {
        let mut report = PruneReport::default();
        let candidates = self.collect(now, log, cancel, &mut report).await?;

        report.candidates = candidates.len();
        info!(
            target: "drprune::prune",
            ctx = %log,
            repositories = report.repositories,
            candidates = report.candidates,
            "candidates collected"
        );

        report.deletion = self.executor.execute(candidates, log, cancel).await?;
        Ok(report)
    }

    /// Candidate set across all repositories, without deleting anything.
    pub async fn collect(
        &self,
        now: OffsetDateTime,
        log: &LogCtx,
        cancel: &CancellationToken,
        report: &mut PruneReport,
    ) -> Result<BTreeSet<DeletionCandidate>, CoreError> {
        let repos = self
            .registry
            .repositories()
            .await
            .map_err(CoreError::ListRepositories)?;

        let mut candidates = BTreeSet::new();
        for repo in repos {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            report.repositories += 1;

            let log = log.with("repo", &repo);
            let policy = self.resolver.resolve(&repo, &log).await;

            let Some(RepoTags { records, latest }) = self.tag_records(&repo, &log, report).await
            else {
                report.skipped_repositories += 1;
                continue;
            };

            let decided = retention::decide(&repo, &policy, &records, now);
            let marked = decided.len();
            let decided = drop_shared(decided, &records, latest.as_deref(), &log, report);
            debug!(
                target: "drprune::prune",
                ctx = %log,
                tags = records.len(),
                marked,
                deletable = decided.len(),
                "repository evaluated"
            );
            candidates.extend(decided);
        }
        Ok(candidates)
    }

    /// Metadata of every tag of `repo` except `latest`, plus the digest `latest` points to.
    ///
    /// `None` if the tags cannot be listed or the `latest` digest cannot be read.
    async fn tag_records(
        &self,
        repo: &str,
        log: &LogCtx,
        report: &mut PruneReport,
    ) -> Option<RepoTags> {
        let tags = match self.registry.tags(repo).await {
            Ok(tags) => tags,
            Err(e) => {
                error!(target: "drprune::prune", ctx = %log, error = %e, "error processing repository");
                return None;
            }
        };

        let mut out = RepoTags {
            records: Vec::with_capacity(tags.len()),
            latest: None,
        };
        for tag in &tags {
            if tag == LATEST_TAG {
                match self.registry.tag_digest(repo, tag).await {
                    Ok(digest) => out.latest = Some(digest),
                    Err(e) => {
                        error!(target: "drprune::prune", ctx = %log, error = %e, "could not resolve latest digest");
                        return None;
                    }
                }
                continue;
            }
            match self.registry.tag_record(repo, tag).await {
                Ok(rec) => out.records.push(rec),
                Err(e) => {
                    let log = log.with("tag", tag);
                    error!(target: "drprune::prune", ctx = %log, error = %e, "could not get manifest metadata");
                    report.skipped_tags += 1;
                }
            }
        }
        Some(out)
    }
}

struct RepoTags {
    records: Vec<TagRecord>,
    latest: Option<String>,
}

/// Remove candidates whose manifest is also referenced by a retained tag.
///
/// Deleting a manifest untags every tag pointing to it, so a candidate sharing a
/// digest with `latest` or with any kept tag must stay. Candidates sharing a digest
/// with each other collapse to the oldest one.
fn drop_shared(
    decided: BTreeSet<DeletionCandidate>,
    records: &[TagRecord],
    latest: Option<&str>,
    log: &LogCtx,
    report: &mut PruneReport,
) -> BTreeSet<DeletionCandidate> {
    let retained: HashSet<&str> = records
        .iter()
        .filter(|r| !decided.contains(*r))
        .map(|r| r.digest.as_str())
        .chain(latest)
        .collect();

    let mut seen = HashSet::new();
    let mut out = BTreeSet::new();
    for candidate in decided {
        if retained.contains(candidate.digest.as_str()) {
            let log = log
                .with("tag", &candidate.tag)
                .with("digest", &candidate.digest);
            warn!(target: "drprune::prune", ctx = %log, "manifest shared with a retained tag, keeping");
            report.shared_digests += 1;
            continue;
        }
        if !seen.insert(candidate.digest.clone()) {
            debug!(target: "drprune::prune", ctx = %log, tag = %candidate.tag, "manifest already scheduled for deletion");
            continue;
        }
        out.insert(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::datetime};

    use drprune_model::RetentionPolicy;

    use super::*;
    use crate::{
        policy::ResolverConfig,
        testing::{FakeRegistry, FakeStore},
    };

    const NOW: OffsetDateTime = datetime!(2024-06-01 0:00 UTC);

    fn rec(repo: &str, tag: &str, days: i64) -> TagRecord {
        TagRecord::new(repo, tag, format!("sha256:{repo}-{tag}"), NOW - Duration::days(days))
    }

    fn pruner(registry: Arc<FakeRegistry>, store: FakeStore) -> Pruner {
        let resolver = ConfigResolver::with_default(
            Arc::new(store),
            ResolverConfig::default(),
            RetentionPolicy::new(["release"], 1, 30, 7),
        );
        Pruner::new(registry, resolver)
    }

    #[tokio::test]
    async fn prunes_across_repositories_with_overrides() {
        let mut registry = FakeRegistry::default();
        registry.add(rec("web", "release-2", 40));
        registry.add(rec("web", "release-1", 50));
        registry.add(rec("web", "feat", 8));
        registry.add(rec("api", "release-2", 40));
        registry.add(rec("api", "release-1", 50));
        registry.add(rec("api", "latest", 999));
        let registry = Arc::new(registry);

        // api keeps two releases
        let store = FakeStore::default().with("apps/drprune/overrides/api", &[("min_release_images", "2")]);

        let report = pruner(registry.clone(), store)
            .run(NOW, &LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.repositories, 2);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.deletion.deleted, 2);
        assert_eq!(registry.deleted_digests(), vec!["sha256:web-release-1", "sha256:web-feat"]);
    }

    #[tokio::test]
    async fn latest_metadata_is_never_fetched() {
        let mut registry = FakeRegistry::default();
        registry.add(rec("web", "latest", 999));
        let registry = Arc::new(registry);

        pruner(registry.clone(), FakeStore::default())
            .run(NOW, &LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(registry.metadata_calls.lock().unwrap().is_empty());
        assert!(registry.deleted_digests().is_empty());
    }

    #[tokio::test]
    async fn manifests_shared_with_retained_tags_survive() {
        let mut registry = FakeRegistry::default();
        let at = |days| NOW - Duration::days(days);
        registry.add(TagRecord::new("web", "latest", "sha256:same", at(30)));
        registry.add(TagRecord::new("web", "feat-old", "sha256:same", at(30)));
        registry.add(TagRecord::new("web", "release-new", "sha256:rel", at(40)));
        registry.add(TagRecord::new("web", "release-alias", "sha256:rel", at(40)));
        registry.add(TagRecord::new("web", "release-old", "sha256:gone", at(60)));
        registry.add(TagRecord::new("web", "release-old-alias", "sha256:gone", at(60)));
        let registry = Arc::new(registry);

        let report = pruner(registry.clone(), FakeStore::default())
            .run(NOW, &LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        // feat-old shares with latest, one release alias shares with the kept release
        assert_eq!(report.shared_digests, 2);
        assert_eq!(report.candidates, 1);
        assert_eq!(registry.deleted_digests(), vec!["sha256:gone"]);
        assert_eq!(
            *registry.digest_calls.lock().unwrap(),
            vec![("web".to_string(), "latest".to_string())]
        );
    }

    #[tokio::test]
    async fn unreadable_latest_skips_repository() {
        let mut registry = FakeRegistry::default();
        registry.add(rec("web", "feat-old", 30));
        registry.tags.get_mut("web").unwrap().push("latest".into());
        let registry = Arc::new(registry);

        let report = pruner(registry.clone(), FakeStore::default())
            .run(NOW, &LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.skipped_repositories, 1);
        assert!(registry.deleted_digests().is_empty());
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let registry = Arc::new(FakeRegistry::default());
        let err = pruner(registry, FakeStore::default())
            .run(NOW, &LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ListRepositories(_)));
    }

    #[tokio::test]
    async fn tag_and_repository_failures_are_skipped() {
        let mut registry = FakeRegistry::default();
        registry.add(rec("web", "feat-old", 30));
        // tag listed but metadata missing
        registry.tags.get_mut("web").unwrap().push("broken".into());
        // repository listed but tags unavailable
        registry.repos.as_mut().unwrap().push("ghost".into());
        let registry = Arc::new(registry);

        let report = pruner(registry.clone(), FakeStore::default())
            .run(NOW, &LogCtx::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.repositories, 2);
        assert_eq!(report.skipped_repositories, 1);
        assert_eq!(report.skipped_tags, 1);
        assert_eq!(registry.deleted_digests(), vec!["sha256:web-feat-old"]);
    }

    #[tokio::test]
    async fn cancellation_between_repositories() {
        let mut registry = FakeRegistry::default();
        registry.add(rec("web", "feat", 30));
        let registry = Arc::new(registry);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pruner(registry.clone(), FakeStore::default())
            .run(NOW, &LogCtx::new(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert!(registry.deleted_digests().is_empty());
    }
}
