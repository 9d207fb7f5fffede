//! Collaborator interfaces.
//!
//! Each trait covers one external system. Implementations live outside this crate;
//! tests use in-memory fakes.

mod config_store;
pub use config_store::ConfigStore;

mod registry;
pub use registry::RegistryApi;

mod scheduler;
pub use scheduler::{Indexed, QueryOptions, SchedulerApi};

mod runtime;
pub use runtime::ContainerRuntime;

mod error;
pub use error::PortError;
