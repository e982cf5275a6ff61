//! Waiting for remote state transitions
//!
//! Control planes answer create/update/delete calls before the underlying
//! object has settled. [`StateChangeConf::wait_for_state`] polls a refresh
//! function until the reported status label leaves the pending set and lands
//! in the target set, bounded by a deadline and the caller's [`Context`].
//!
//! ```ignore
//! let monitor = StateChangeConf::new(["PENDING"], ["ACTIVE", "INACTIVE"])
//!     .timeout(Duration::from_secs(600))
//!     .min_timeout(Duration::from_secs(10))
//!     .wait_for_state(&ctx, || status_monitor(&client, &name))
//!     .await?;
//! ```

use crate::context::Context;
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Consecutive absences tolerated while waiting for a non-empty target set
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

type BoxError = Box<dyn StdError + Send + Sync>;

/// Failure reported by a refresh function
///
/// `NotFound` is not an error for the poller: it means the remote object is
/// absent, which is the expected outcome when waiting for a deletion.
#[derive(Debug)]
pub enum RefreshError<E> {
    NotFound,
    Other(E),
}

impl<E> From<E> for RefreshError<E> {
    fn from(err: E) -> Self {
        RefreshError::Other(err)
    }
}

/// Outcome of a poll that did not reach its target
#[derive(Debug, thiserror::Error)]
pub enum WaitError<T> {
    #[error("error while refreshing state: {0}")]
    Refresh(BoxError),

    #[error("couldn't find resource ({retries} retries)")]
    NotFound { retries: u32 },

    #[error("unexpected state '{state}', wanted target '{}'", .expected.join(", "))]
    UnexpectedState {
        state: String,
        expected: Vec<String>,
        last: Option<T>,
    },

    #[error(
        "timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})",
        .expected.join(", ")
    )]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
        last: Option<T>,
        last_error: Option<String>,
    },

    #[error("wait cancelled")]
    Cancelled { last: Option<T> },
}

impl<T> WaitError<T> {
    /// The last snapshot observed before the poll gave up, if any
    pub fn last_snapshot(&self) -> Option<&T> {
        match self {
            WaitError::UnexpectedState { last, .. }
            | WaitError::Timeout { last, .. }
            | WaitError::Cancelled { last } => last.as_ref(),
            WaitError::Refresh(_) | WaitError::NotFound { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// Poll configuration for a single wait
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Lower bound on the wait between two refreshes
    pub min_timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Fixed cadence replacing the exponential backoff when non-zero
    pub poll_interval: Duration,
    pub not_found_checks: u32,
    /// Consecutive target observations required before succeeding
    pub continuous_target_occurence: u32,
}

impl StateChangeConf {
    pub fn new<P, S, Q, R>(pending: P, target: Q) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
        Q: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(300),
            min_timeout: Duration::ZERO,
            delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurence: 1,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn continuous_target_occurence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurence = occurrences;
        self
    }

    /// Polls `refresh` until its label reaches the target set.
    ///
    /// Returns the snapshot that satisfied the target, or `None` when an
    /// absent object satisfied an empty target set. The deadline is fixed
    /// when the call starts. Cancellation is observed before every refresh
    /// and during every sleep, never during an in-flight refresh.
    pub async fn wait_for_state<T, E, F, Fut>(
        &self,
        ctx: &Context,
        mut refresh: F,
    ) -> Result<Option<T>, WaitError<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(T, String), RefreshError<E>>>,
        E: Into<BoxError>,
    {
        let deadline = Instant::now() + self.timeout;
        let absence_listed = self.is_listed("");
        let required_occurrences = self.continuous_target_occurence.max(1);

        let mut backoff = Backoff::new(self.min_timeout, self.poll_interval);
        let mut last: Option<T> = None;
        let mut last_state = String::new();
        let mut last_error: Option<String> = None;
        let mut not_found_tick = 0u32;
        let mut target_occurrences = 0u32;

        if !self.delay.is_zero() {
            let nap = self.delay.min(deadline.saturating_duration_since(Instant::now()));
            tracing::trace!(?nap, "waiting before first refresh");
            tokio::select! {
                _ = ctx.cancelled() => return Err(WaitError::Cancelled { last }),
                _ = time::sleep(nap) => {}
            }
        }

        loop {
            if ctx.is_cancelled() {
                tracing::debug!(last_state = %last_state, "wait cancelled");
                return Err(WaitError::Cancelled { last });
            }

            if Instant::now() >= deadline {
                tracing::debug!(
                    last_state = %last_state,
                    timeout = ?self.timeout,
                    "timed out waiting for target state"
                );
                return Err(WaitError::Timeout {
                    last_state,
                    expected: self.target.clone(),
                    timeout: self.timeout,
                    last,
                    last_error,
                });
            }

            let (snapshot, label) = match refresh().await {
                Ok((snapshot, label)) => (Some(snapshot), label),
                Err(RefreshError::Other(err)) => return Err(WaitError::Refresh(err.into())),
                Err(RefreshError::NotFound) if absence_listed => (None, String::new()),
                Err(RefreshError::NotFound) => {
                    last = None;
                    last_state = String::new();
                    target_occurrences = 0;

                    if self.target.is_empty() {
                        tracing::debug!("object no longer exists");
                        return Ok(None);
                    }

                    not_found_tick += 1;
                    tracing::trace!(not_found_tick, "object not found while waiting");
                    if not_found_tick >= self.not_found_checks {
                        return Err(WaitError::NotFound {
                            retries: not_found_tick,
                        });
                    }
                    last_error = Some("resource not found".to_string());

                    backoff.advance();
                    self.sleep(ctx, &mut backoff, deadline, &mut last).await?;
                    continue;
                }
            };

            not_found_tick = 0;
            last_error = None;
            tracing::trace!(state = %label, "refreshed state");

            if self.target.contains(&label) {
                target_occurrences += 1;
                if target_occurrences >= required_occurrences {
                    tracing::debug!(state = %label, "reached target state");
                    return Ok(snapshot);
                }

                last = snapshot;
                last_state = label;
                self.sleep(ctx, &mut backoff, deadline, &mut last).await?;
                continue;
            }

            if !self.pending.contains(&label) {
                tracing::debug!(state = %label, "unexpected state");
                return Err(WaitError::UnexpectedState {
                    state: label,
                    expected: self.target.clone(),
                    last: snapshot,
                });
            }

            target_occurrences = 0;
            last = snapshot;
            last_state = label;

            backoff.advance();
            self.sleep(ctx, &mut backoff, deadline, &mut last).await?;
        }
    }

    fn is_listed(&self, label: &str) -> bool {
        self.target.iter().chain(&self.pending).any(|l| l == label)
    }

    async fn sleep<T>(
        &self,
        ctx: &Context,
        backoff: &mut Backoff,
        deadline: Instant,
        last: &mut Option<T>,
    ) -> Result<(), WaitError<T>> {
        let nap = backoff
            .current()
            .min(deadline.saturating_duration_since(Instant::now()));
        tracing::trace!(?nap, "sleeping before next refresh");

        tokio::select! {
            _ = ctx.cancelled() => Err(WaitError::Cancelled { last: last.take() }),
            _ = time::sleep(nap) => Ok(()),
        }
    }
}

/// Exponential wait between refreshes
#[derive(Debug)]
struct Backoff {
    wait: Duration,
    floor: Duration,
    fixed: Duration,
    started: bool,
}

impl Backoff {
    fn new(floor: Duration, fixed: Duration) -> Self {
        Self {
            wait: INITIAL_BACKOFF,
            floor,
            fixed,
            started: false,
        }
    }

    /// Doubles the wait, except for the very first one
    fn advance(&mut self) {
        if self.started {
            self.wait = (self.wait * 2).min(MAX_BACKOFF);
        }
        self.started = true;
    }

    fn current(&self) -> Duration {
        let wait = if self.fixed.is_zero() {
            self.wait
        } else {
            self.fixed
        };
        wait.max(self.floor)
    }
}

/// Error from [`retry_when`]
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The operation failed with a non-retryable error, or was still failing
    /// when the timeout elapsed
    #[error("{0}")]
    Operation(E),

    #[error("retry cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Operation(err) => Some(err),
            RetryError::Cancelled => None,
        }
    }
}

/// Re-runs `op` while `is_retryable` classifies its error as transient.
///
/// Used for eventual-consistency failures such as IAM propagation, where the
/// same call succeeds once the control plane catches up. On timeout the last
/// error is returned.
pub async fn retry_when<T, E, F, Fut, P>(
    ctx: &Context,
    timeout: Duration,
    mut op: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut backoff = Backoff::new(Duration::ZERO, Duration::ZERO);
    let mut attempt = 0u32;

    loop {
        if ctx.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(RetryError::Operation(err));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!(attempt, "retryable error persisted past timeout");
            return Err(RetryError::Operation(err));
        }

        backoff.advance();
        let nap = backoff.current().min(remaining);
        tracing::trace!(attempt, ?nap, "retrying after retryable error");

        tokio::select! {
            _ = ctx.cancelled() => return Err(RetryError::Cancelled),
            _ = time::sleep(nap) => {}
        }
    }
}
