use serde::{Deserialize, Serialize};
use time::Duration;

use crate::PolicyOverride;

const DEFAULT_RELEASE_PREFIXES: [&str; 3] = ["master", "release", "latest"];
const DEFAULT_MIN_RELEASE_IMAGES: usize = 5;
const DEFAULT_MIN_RELEASE_EVICTION_DAYS: u32 = 30;
const DEFAULT_MIN_FEATURE_EVICTION_DAYS: u32 = 7;

/// Retention rules applied to the tags of one repository.
///
/// A policy is immutable once built: per-repository variants are produced with
/// [`RetentionPolicy::overlay`], which returns an independent copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    release_prefixes: Vec<String>,
    min_release_images: usize,
    min_release_eviction_days: u32,
    min_feature_eviction_days: u32,
}

impl RetentionPolicy {
    pub fn new<I, S>(
        release_prefixes: I,
        min_release_images: usize,
        min_release_eviction_days: u32,
        min_feature_eviction_days: u32,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            release_prefixes: release_prefixes.into_iter().map(Into::into).collect(),
            min_release_images,
            min_release_eviction_days,
            min_feature_eviction_days,
        }
    }

    /// Tag name prefixes that mark a tag as a release build.
    pub fn release_prefixes(&self) -> &[String] {
        &self.release_prefixes
    }

    /// Number of newest release tags that are always kept.
    pub fn min_release_images(&self) -> usize {
        self.min_release_images
    }

    pub fn min_release_eviction_days(&self) -> u32 {
        self.min_release_eviction_days
    }

    pub fn min_feature_eviction_days(&self) -> u32 {
        self.min_feature_eviction_days
    }

    /// Returns `true` if `tag` starts with any configured release prefix.
    pub fn is_release(&self, tag: &str) -> bool {
        self.release_prefixes
            .iter()
            .any(|prefix| tag.starts_with(prefix.as_str()))
    }

    /// Age a release tag (outside the kept window) must exceed to be evicted.
    pub fn release_eviction_age(&self) -> Duration {
        Duration::days(i64::from(self.min_release_eviction_days))
    }

    /// Age a feature tag must exceed to be evicted.
    pub fn feature_eviction_age(&self) -> Duration {
        Duration::days(i64::from(self.min_feature_eviction_days))
    }

    /// Build a new policy from `self` with every field present in `over` replaced.
    ///
    /// `self` is left untouched; absent override fields keep the values of `self`.
    pub fn overlay(&self, over: &PolicyOverride) -> RetentionPolicy {
        RetentionPolicy {
            release_prefixes: over
                .release_tags
                .clone()
                .unwrap_or_else(|| self.release_prefixes.clone()),
            min_release_images: over.min_release_images.unwrap_or(self.min_release_images),
            min_release_eviction_days: over
                .min_release_eviction_days
                .unwrap_or(self.min_release_eviction_days),
            min_feature_eviction_days: over
                .min_feature_eviction_days
                .unwrap_or(self.min_feature_eviction_days),
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RELEASE_PREFIXES,
            DEFAULT_MIN_RELEASE_IMAGES,
            DEFAULT_MIN_RELEASE_EVICTION_DAYS,
            DEFAULT_MIN_FEATURE_EVICTION_DAYS,
        )
    }
}
