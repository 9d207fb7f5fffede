mod allocation;
pub use allocation::{AllocationHandle, ClientStatus};

mod cluster_job;
pub use cluster_job::{ClusterJob, JobError};

mod exec_output;
pub use exec_output::ExecOutput;

/// Blocking-query index returned by the scheduler with every read.
pub type WaitIndex = u64;
