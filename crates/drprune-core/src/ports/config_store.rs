use async_trait::async_trait;
use drprune_model::KeyValue;

use crate::ports::PortError;

/// Hierarchical key-value store holding retention policies.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All entries below the folder `path`.
    ///
    /// `Ok(None)` means the path does not exist.
    async fn list(&self, path: &str) -> Result<Option<Vec<KeyValue>>, PortError>;
}
