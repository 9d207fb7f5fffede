use serde::{Deserialize, Serialize};

use crate::{ClusterJob, GcCommand};

/// Container selected for garbage collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerTarget {
    pub id: String,
    pub name: String,
}

/// What a garbage collector found to run against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum GcTarget {
    /// A running scheduler allocation of the registry job.
    Allocation {
        /// Descriptor as fetched before any modification.
        job: ClusterJob,
        alloc_id: String,
        task: String,
        command: GcCommand,
    },
    /// Local containers whose name matched the configured prefix.
    Containers {
        containers: Vec<ContainerTarget>,
        command: GcCommand,
    },
}

impl GcTarget {
    /// Short identifier for logging: `"allocation"` or `"containers"`.
    pub fn kind(&self) -> &'static str {
        match self {
            GcTarget::Allocation { .. } => "allocation",
            GcTarget::Containers { .. } => "containers",
        }
    }
}
