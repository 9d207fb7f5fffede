//! Bounded wait-index long polling.
use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    LogCtx,
    ports::{Indexed, PortError, QueryOptions},
};

const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_WAIT: Duration = Duration::from_secs(60);
/// Slack on top of the server-side wait before an attempt is abandoned client-side.
const CLIENT_GRACE: Duration = Duration::from_secs(5);

/// Retry budget of a long-poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    /// How long the server may block on a single attempt.
    pub wait: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        Self { max_attempts, wait }
    }

    /// Client-side limit for one attempt: the server wait plus 1/16 jitter and a grace period.
    pub fn attempt_timeout(&self) -> Duration {
        self.wait + self.wait / 16 + CLIENT_GRACE
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WAIT)
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep<T> {
    Ready(T),
    Pending,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("{what}: not ready after {attempts} attempts")]
    Exhausted { what: &'static str, attempts: u32 },

    #[error("{what}: {source}")]
    Probe {
        what: &'static str,
        #[source]
        source: PortError,
    },

    #[error("{what}: cancelled")]
    Cancelled { what: &'static str },
}

/// Probe until it reports [`PollStep::Ready`] or the policy budget is spent.
///
/// Every attempt receives the index returned by the previous one. A probe error ends the
/// loop immediately; an attempt that outlives [`PollPolicy::attempt_timeout`] counts as
/// pending. Cancellation is checked before and during each attempt.
pub async fn long_poll<T, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    log: &LogCtx,
    what: &'static str,
    mut probe: F,
) -> Result<T, PollError>
where
    F: FnMut(QueryOptions) -> Fut,
    Fut: Future<Output = Result<Indexed<PollStep<T>>, PortError>>,
{
    let mut wait_index = 0;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { what });
        }
        let query = QueryOptions {
            wait_index,
            wait_time: policy.wait,
        };
        debug!(target: "drprune::poll", ctx = %log, what, attempt, wait_index, "polling");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled { what }),
            r = tokio::time::timeout(policy.attempt_timeout(), probe(query)) => r,
        };

        match outcome {
            Ok(Ok(Indexed { value: PollStep::Ready(v), .. })) => return Ok(v),
            Ok(Ok(Indexed { value: PollStep::Pending, last_index })) => {
                wait_index = last_index;
                info!(target: "drprune::poll", ctx = %log, what, attempt, "not ready yet, retrying");
            }
            Ok(Err(source)) => return Err(PollError::Probe { what, source }),
            Err(_elapsed) => {
                info!(target: "drprune::poll", ctx = %log, what, attempt, "attempt timed out, retrying");
            }
        }
    }

    Err(PollError::Exhausted {
        what,
        attempts: policy.max_attempts,
    })
}
