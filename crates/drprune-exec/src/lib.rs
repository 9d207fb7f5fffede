//! Subprocess adapters: a cancellable command runner plus the `nomad` and `docker`
//! command-line front ends built on it.

mod error;
pub use error::{ExecError, ExecResult};

mod util;

pub mod proc;
pub use proc::{ProcConfig, run};

pub mod nomad;
pub use nomad::NomadExec;

pub mod docker;
pub use docker::DockerCli;
