//! Fixed-delay retry for fallible async operations.
//!
//! [`RetryPolicy::wrap`] turns an operation into a [`Retry`] with the same
//! call shape: it takes a [`CallContext`] and yields the operation's own
//! `Result<T, E>`. Between attempts it waits for the delay or the context,
//! whichever comes first; an interrupted wait returns the interruption,
//! not the operation's last error.

use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use tracing::{debug, warn};

use srep_core::context::{CallContext, Interrupted};
use srep_core::error::{SrepError, SrepResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; it must be at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> SrepResult<Self> {
        let max_attempts = NonZeroU32::new(max_attempts).ok_or_else(|| {
            SrepError::InvalidConfig("retry attempts must be at least 1".into())
        })?;
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.get()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn wrap<F>(self, op: F) -> Retry<F> {
        Retry { policy: self, op }
    }
}

/// An operation decorated with a [`RetryPolicy`].
pub struct Retry<F> {
    policy: RetryPolicy,
    op: F,
}

impl<F> Retry<F> {
    pub async fn call<T, E, Fut>(&mut self, ctx: &CallContext) -> Result<T, E>
    where
        F: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Interrupted> + Display,
    {
        let max = self.policy.max_attempts.get();
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts = max, "attempt");
            let err = match (self.op)(ctx.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max => return Err(e),
                Err(e) => e,
            };
            warn!(
                attempt,
                max_attempts = max,
                delay_ms = self.policy.delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );

            tokio::select! {
                biased;
                interrupted = ctx.done() => {
                    debug!(attempt, reason = ?interrupted, "retry interrupted");
                    return Err(E::from(interrupted));
                }
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
            attempt += 1;
        }
    }
}

/// Run `op` once under `policy` without keeping the wrapper around.
pub async fn retry<F, T, E, Fut>(policy: RetryPolicy, ctx: &CallContext, op: F) -> Result<T, E>
where
    F: FnMut(CallContext) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<Interrupted> + Display,
{
    policy.wrap(op).call(ctx).await
}
