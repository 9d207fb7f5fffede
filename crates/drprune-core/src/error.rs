use thiserror::Error;

use crate::{gc::GcError, ports::PortError};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to list repositories: {0}")]
    ListRepositories(#[source] PortError),

    #[error("cancelled")]
    Cancelled,

    #[error("garbage collection failed: {0}")]
    Gc(#[from] GcError),
}
