//! Deadline enforcement for backend calls.
//!
//! # Design Decisions
//! - Deadlines are optional; `None` leaves the call unbounded
//! - An elapsed deadline is its own error, distinct from transport failures,
//!   so callers can answer 504 instead of 502

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline passed before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} elapsed")]
pub struct DeadlineElapsed(pub Duration);

/// Run `operation`, giving up after `deadline` if one is set.
pub async fn with_deadline<F>(deadline: Option<Duration>, operation: F) -> Result<F::Output, DeadlineElapsed>
where
    F: Future,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| DeadlineElapsed(limit)),
        None => Ok(operation.await),
    }
}
