//! Deadline polling for conditions that become true eventually.
//!
//! UI state on a real device lags the commands that change it, so callers
//! wrap assertions in [`wait_for`]: the condition is re-evaluated on a fixed
//! cadence until it succeeds or a wall-clock deadline passes. The deadline is
//! checked immediately before each evaluation, never between evaluation and
//! sleep, which pins the attempt count to `floor(timeout / retry_frequency)`
//! for a condition that never succeeds.
//!
//! A condition that *errors* is different from one that returns false: the
//! error is an operational failure and propagates out on the spot, unretried.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use bramble_core::poll::{wait_for, WaitOptions};
//!
//! # async fn example() -> Result<(), bramble_core::error::Error> {
//! let options = WaitOptions {
//!     timeout: Duration::from_secs(10),
//!     failure_message: "spinner never went away".to_string(),
//!     ..Default::default()
//! };
//! wait_for(|| async { Ok(true) }, &options).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Settings for one [`wait_for`] call.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Wall-clock budget for the whole wait, measured from the first
    /// evaluation (after `initial_delay`).
    pub timeout: Duration,

    /// Pause between consecutive evaluations.
    pub retry_frequency: Duration,

    /// Pause before the first evaluation. May be zero.
    pub initial_delay: Duration,

    /// Message carried verbatim by the timeout failure, so assertions on
    /// message content are reliable.
    pub failure_message: String,

    /// When false, a deadline expiry returns [`WaitOutcome::TimedOut`]
    /// instead of raising [`Error::WaitTimeout`].
    pub throw_on_timeout: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_frequency: Duration::from_secs(1),
            initial_delay: Duration::ZERO,
            failure_message: "condition was not satisfied within the wait timeout".to_string(),
            throw_on_timeout: true,
        }
    }
}

impl WaitOptions {
    /// Convenience constructor taking whole-second settings.
    pub fn from_secs(
        timeout: u64,
        retry_frequency: u64,
        initial_delay: u64,
        failure_message: impl Into<String>,
        throw_on_timeout: bool,
    ) -> Self {
        Self {
            timeout: Duration::from_secs(timeout),
            retry_frequency: Duration::from_secs(retry_frequency),
            initial_delay: Duration::from_secs(initial_delay),
            failure_message: failure_message.into(),
            throw_on_timeout,
        }
    }
}

/// How a [`wait_for`] call ended when it did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition returned true before the deadline.
    Satisfied,

    /// The deadline passed. Only returned when
    /// [`WaitOptions::throw_on_timeout`] is false.
    TimedOut,
}

/// Evaluates `condition` on a fixed cadence until it succeeds or the
/// deadline passes.
///
/// Sleeps are cooperative (`tokio::time::sleep`); one evaluation always
/// completes before the next begins, and there is no cancellation other
/// than the deadline itself.
///
/// # Errors
///
/// - [`Error::WaitTimeout`] carrying `failure_message` verbatim, when the
///   deadline passes and `throw_on_timeout` is true
/// - Whatever `condition` itself returns as an `Err`, immediately and
///   without further attempts
pub async fn wait_for<F, Fut>(mut condition: F, options: &WaitOptions) -> Result<WaitOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    if !options.initial_delay.is_zero() {
        trace!(delay = ?options.initial_delay, "initial delay before first attempt");
        tokio::time::sleep(options.initial_delay).await;
    }

    let started = tokio::time::Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if started.elapsed() >= options.timeout {
            debug!(attempts = attempt, timeout = ?options.timeout, "wait deadline elapsed");
            return if options.throw_on_timeout {
                Err(Error::WaitTimeout(options.failure_message.clone()))
            } else {
                Ok(WaitOutcome::TimedOut)
            };
        }

        attempt += 1;
        trace!(attempt, "evaluating wait condition");
        if condition().await? {
            debug!(attempts = attempt, "wait condition satisfied");
            return Ok(WaitOutcome::Satisfied);
        }

        tokio::time::sleep(options.retry_frequency).await;
    }
}
