//! Retention decisions and garbage-collection orchestration for a container registry.
//!
//! The crate is I/O free: every external system is reached through the traits in [`ports`],
//! implemented by `drprune-client` (HTTP) and `drprune-exec` (subprocess) adapters.

pub mod error;
pub use error::CoreError;

mod log;
pub use log::LogCtx;

pub mod ports;
pub use ports::{ConfigStore, ContainerRuntime, Indexed, PortError, QueryOptions, RegistryApi, SchedulerApi};

pub mod poll;
pub use poll::{PollError, PollPolicy, PollStep};

pub mod policy;
pub use policy::{ConfigResolver, PolicyError, ResolverConfig};

pub mod retention;
pub use retention::decide;

pub mod deletion;
pub use deletion::{DeletionExecutor, DeletionReport};

pub mod prune;
pub use prune::{PruneReport, Pruner};

pub mod gc;
pub use gc::{ClusterGc, ClusterGcConfig, ClusterStage, GarbageCollector, GcError, RuntimeGc, RuntimeGcConfig};

#[cfg(test)]
pub(crate) mod testing;
