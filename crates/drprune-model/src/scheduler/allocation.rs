use serde::{Deserialize, Serialize};

/// Client-side state of an allocation as reported by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Lost,
    #[serde(other)]
    Unknown,
}

impl ClientStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ClientStatus::Running)
    }
}

/// Scheduler-assigned identity of a task instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationHandle {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "ClientStatus")]
    pub client_status: ClientStatus,
}

impl AllocationHandle {
    pub fn new(id: impl Into<String>, client_status: ClientStatus) -> Self {
        Self {
            id: id.into(),
            client_status,
        }
    }
}
