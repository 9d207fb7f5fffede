use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Metadata of one `(repo, tag)` pair as reported by the registry.
///
/// Ordering is by creation time first, then repo, tag and digest, so a sorted
/// collection of records is oldest-first and fully deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub repo: String,
    pub tag: String,
    pub digest: String,
}

/// A tag the retention engine decided to delete.
pub type DeletionCandidate = TagRecord;

impl TagRecord {
    pub fn new(
        repo: impl Into<String>,
        tag: impl Into<String>,
        digest: impl Into<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            created_at,
            repo: repo.into(),
            tag: tag.into(),
            digest: digest.into(),
        }
    }

    /// Time elapsed between creation and `now` (negative for clock skew).
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.created_at
    }
}
