//! Retention decision engine.
//!
//! Given the tags of one repository and its policy, decide which tags to delete:
//! - `latest` is never deleted;
//! - feature tags (no release prefix) are deleted once strictly older than the feature window;
//! - release tags are ranked newest-first, the first `min_release_images` are kept, the rest
//!   are deleted once strictly older than the release window.
//!
//! Equal creation times are ranked by tag name, descending.
use std::collections::BTreeSet;

use drprune_model::{DeletionCandidate, LATEST_TAG, RetentionPolicy, TagRecord};
use time::OffsetDateTime;

/// Tags of `repo` to delete under `policy` at instant `now`.
///
/// Pure and deterministic: the same snapshot and `now` always give the same set.
/// Records belonging to another repository are ignored.
pub fn decide(
    repo: &str,
    policy: &RetentionPolicy,
    tags: &[TagRecord],
    now: OffsetDateTime,
) -> BTreeSet<DeletionCandidate> {
    let (mut releases, features): (Vec<&TagRecord>, Vec<&TagRecord>) = tags
        .iter()
        .filter(|r| r.repo == repo && r.tag != LATEST_TAG)
        .partition(|r| policy.is_release(&r.tag));

    let mut out: BTreeSet<DeletionCandidate> = features
        .into_iter()
        .filter(|r| r.age(now) > policy.feature_eviction_age())
        .cloned()
        .collect();

    releases.sort_by(|a, b| (b.created_at, &b.tag).cmp(&(a.created_at, &a.tag)));
    out.extend(
        releases
            .into_iter()
            .skip(policy.min_release_images())
            .filter(|r| r.age(now) > policy.release_eviction_age())
            .cloned(),
    );

    out
}
