use async_trait::async_trait;
use drprune_model::TagRecord;

use crate::ports::PortError;

/// Container registry operations needed for pruning.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Every repository in the catalog.
    async fn repositories(&self) -> Result<Vec<String>, PortError>;

    /// Every tag of `repo`.
    async fn tags(&self, repo: &str) -> Result<Vec<String>, PortError>;

    /// Digest and creation time of `repo:tag`.
    async fn tag_record(&self, repo: &str, tag: &str) -> Result<TagRecord, PortError>;

    /// Digest of the manifest `repo:tag` points to, without its creation time.
    async fn tag_digest(&self, repo: &str, tag: &str) -> Result<String, PortError>;

    /// Delete the manifest `digest` of `repo`.
    async fn delete_manifest(&self, repo: &str, digest: &str) -> Result<(), PortError>;
}
