use drprune_model::JobError;
use thiserror::Error;

use crate::{gc::ps::PsParseError, gc::ClusterStage, poll::PollError, ports::PortError};

#[derive(Debug, Error)]
pub enum GcError {
    #[error("scheduler job {0} not found")]
    JobNotFound(String),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("scheduler call failed during {stage}: {source}")]
    Scheduler {
        stage: ClusterStage,
        #[source]
        source: PortError,
    },

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("could not parse process listing: {0}")]
    Ps(#[from] PsParseError),

    #[error("could not determine registry command and config file for garbage collection")]
    CommandNotFound,

    #[error("{what} exited with non-zero status {code}")]
    NonZeroExit { what: &'static str, code: i32 },

    #[error("{what} could not be executed: {source}")]
    Exec {
        what: &'static str,
        #[source]
        source: PortError,
    },

    #[error("failed to list containers: {0}")]
    ListContainers(#[source] PortError),

    #[error("collector {collector} cannot run against a {kind} target")]
    UnsupportedTarget {
        collector: &'static str,
        kind: &'static str,
    },

    #[error("failed to restore read-write mode: {0}")]
    Restore(#[source] Box<GcError>),

    #[error("cancelled")]
    Cancelled,
}
