use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::KeyValue;

const KEY_RELEASE_TAGS: &str = "release_tags";
const KEY_MIN_RELEASE_IMAGES: &str = "min_release_images";
const KEY_MIN_RELEASE_EVICTION_DAYS: &str = "min_release_eviction_days";
const KEY_MIN_FEATURE_EVICTION_DAYS: &str = "min_feature_eviction_days";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyDecodeError {
    #[error("key {key}: value is not valid utf-8")]
    NotUtf8 { key: String },
    #[error("key {key}: expected a JSON array of strings: {reason}")]
    InvalidList { key: String, reason: String },
    #[error("key {key}: expected a non-negative integer, got {value:?}")]
    InvalidNumber { key: String, value: String },
}

/// Partial retention policy read from the config store.
///
/// Every field is optional; `None` means "keep the value of the policy this is overlaid on".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    pub release_tags: Option<Vec<String>>,
    pub min_release_images: Option<usize>,
    pub min_release_eviction_days: Option<u32>,
    pub min_feature_eviction_days: Option<u32>,
}

impl PolicyOverride {
    /// Decode the entries found under `path`.
    ///
    /// Keys are matched relative to `path` and case-insensitively.
    /// The folder entry itself, nested folders and unknown keys are ignored.
    /// `release_tags` holds a JSON array, the other fields decimal integers.
    pub fn decode(path: &str, entries: &[KeyValue]) -> Result<Self, PolicyDecodeError> {
        let mut out = PolicyOverride::default();

        for entry in entries {
            let Some(rel) = entry.relative_to(path) else {
                continue;
            };
            if rel.is_empty() || rel.contains('/') {
                continue;
            }

            let key = rel.to_ascii_lowercase();
            match key.as_str() {
                KEY_RELEASE_TAGS => out.release_tags = Some(decode_list(&key, entry.value())?),
                KEY_MIN_RELEASE_IMAGES => {
                    out.min_release_images = Some(decode_number(&key, entry.value())?)
                }
                KEY_MIN_RELEASE_EVICTION_DAYS => {
                    out.min_release_eviction_days = Some(decode_number(&key, entry.value())?)
                }
                KEY_MIN_FEATURE_EVICTION_DAYS => {
                    out.min_feature_eviction_days = Some(decode_number(&key, entry.value())?)
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        self.release_tags.is_none()
            && self.min_release_images.is_none()
            && self.min_release_eviction_days.is_none()
            && self.min_feature_eviction_days.is_none()
    }
}

fn as_text<'a>(key: &str, raw: &'a [u8]) -> Result<&'a str, PolicyDecodeError> {
    std::str::from_utf8(raw)
        .map(str::trim)
        .map_err(|_| PolicyDecodeError::NotUtf8 { key: key.to_string() })
}

fn decode_list(key: &str, raw: &[u8]) -> Result<Vec<String>, PolicyDecodeError> {
    let text = as_text(key, raw)?;
    serde_json::from_str(text).map_err(|e| PolicyDecodeError::InvalidList {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn decode_number<T: std::str::FromStr>(key: &str, raw: &[u8]) -> Result<T, PolicyDecodeError> {
    let text = as_text(key, raw)?;
    text.parse().map_err(|_| PolicyDecodeError::InvalidNumber {
        key: key.to_string(),
        value: text.to_string(),
    })
}
