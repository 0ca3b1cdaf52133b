//! The one bounded external call
//!
//! Every suspending call to a collaborator goes through [`BoundedCall`]: a
//! single fixed timeout, no retries here. When the deadline passes the inner
//! future is dropped, so a late result is discarded rather than applied.

use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundedCallError<E> {
    #[error("{label} timed out after {}ms", timeout.as_millis())]
    Timeout { label: &'static str, timeout: Duration },
    #[error("{label} failed: {source}")]
    Failed {
        label: &'static str,
        #[source]
        source: E,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct BoundedCall {
    timeout: Duration,
}

impl BoundedCall {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run<T, E, F>(&self, label: &'static str, call: F) -> Result<T, BoundedCallError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => {
                tracing::warn!(
                    call = label,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %source,
                    "Bounded call failed"
                );
                Err(BoundedCallError::Failed { label, source })
            }
            Err(_) => {
                tracing::warn!(
                    call = label,
                    timeout_ms = %self.timeout.as_millis(),
                    "Bounded call timed out, abandoning"
                );
                Err(BoundedCallError::Timeout {
                    label,
                    timeout: self.timeout,
                })
            }
        }
    }
}
