use serde::{Deserialize, Serialize};

/// Single entry returned by a hierarchical key-value read.
///
/// `key` is the full path of the entry, `value` its raw bytes (empty for folder entries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    key: String,
    value: Vec<u8>,
}

impl KeyValue {
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Key relative to `prefix`, without leading separators.
    ///
    /// Returns `None` when the entry does not live under `prefix` (folder-bounded:
    /// `apps/app-other/x` is not under `apps/app`).
    pub fn relative_to(&self, prefix: &str) -> Option<&str> {
        let prefix = prefix.trim_end_matches('/');
        let rest = self.key.strip_prefix(prefix)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        Some(rest.trim_start_matches('/'))
    }
}
