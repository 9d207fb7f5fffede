use std::time::Duration;

use async_trait::async_trait;
use drprune_model::{AllocationHandle, ClusterJob, ExecOutput, WaitIndex};
use tokio_util::sync::CancellationToken;

use crate::ports::PortError;

/// Blocking-query parameters: return once the index moves past `wait_index`
/// or `wait_time` elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub wait_index: WaitIndex,
    pub wait_time: Duration,
}

/// A value together with the index it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexed<T> {
    pub value: T,
    pub last_index: WaitIndex,
}

impl<T> Indexed<T> {
    pub fn new(value: T, last_index: WaitIndex) -> Self {
        Self { value, last_index }
    }
}

/// Cluster scheduler that owns the registry job.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    /// Job descriptor by name; `Ok(None)` if the job does not exist.
    async fn job(&self, name: &str) -> Result<Option<ClusterJob>, PortError>;

    /// Stop the job; with `purge` the job is removed from the scheduler state.
    async fn deregister(&self, name: &str, purge: bool) -> Result<(), PortError>;

    /// Submit `job`, returning the id of the evaluation it created.
    async fn register(&self, job: &ClusterJob) -> Result<String, PortError>;

    /// Allocations created by evaluation `eval_id`.
    async fn eval_allocations(
        &self,
        eval_id: &str,
        query: QueryOptions,
    ) -> Result<Indexed<Vec<AllocationHandle>>, PortError>;

    /// Allocation by id; `value` is `None` while the scheduler does not know it.
    async fn allocation(
        &self,
        alloc_id: &str,
        query: QueryOptions,
    ) -> Result<Indexed<Option<AllocationHandle>>, PortError>;

    /// Run `argv` inside `task` of allocation `alloc_id`.
    async fn exec(
        &self,
        alloc_id: &str,
        task: &str,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, PortError>;
}
