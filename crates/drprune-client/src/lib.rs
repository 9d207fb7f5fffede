//! HTTP adapters for the collaborators of the pruner: the registry v2 API, Consul KV
//! and the Nomad HTTP API.

mod config;
pub use config::{ConsulConfig, NomadConfig, RegistryConfig};

mod errors;
pub use errors::ClientError;

mod http;

pub mod registry;
pub use registry::RegistryClient;

pub mod consul;
pub use consul::ConsulKv;

pub mod nomad;
pub use nomad::NomadClient;
