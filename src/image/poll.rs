//! Result polling with backoff and jitter.

use crate::error::{FluxError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::ResultResponse;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How the nominal delay evolves across polls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackoffGrowth {
    /// Every poll waits `base` (plus jitter).
    #[default]
    Constant,
    /// Poll `n` waits `base * 2^n` (plus jitter), capped at `max_delay`.
    Exponential,
}

/// Delay schedule between result polls.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay before the first poll.
    pub base: Duration,
    /// Upper bound (exclusive) of the uniform random jitter added to each delay.
    pub max_jitter: Duration,
    /// Cap on the nominal delay before jitter. Only applies to exponential growth.
    pub max_delay: Duration,
    /// Growth mode.
    pub growth: BackoffGrowth,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max_jitter: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            growth: BackoffGrowth::Constant,
        }
    }
}

impl Backoff {
    /// Constant delay of `base` plus the default jitter.
    pub fn constant(base: Duration) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Doubling delay starting at `base` plus the default jitter.
    pub fn exponential(base: Duration) -> Self {
        Self {
            base,
            growth: BackoffGrowth::Exponential,
            ..Self::default()
        }
    }

    /// Sets the jitter bound. Zero disables jitter.
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Sets the cap on the nominal delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before poll `attempt` (0-based), without jitter.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        match self.growth {
            BackoffGrowth::Constant => self.base,
            BackoffGrowth::Exponential => self
                .base
                .saturating_mul(1u32 << attempt.min(31))
                .min(self.max_delay),
        }
    }

    /// Delay before poll `attempt` (0-based), with jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.nominal_delay(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_secs_f64();
        if max <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..max))
    }
}

/// Settings for one polling run.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Delay schedule.
    pub backoff: Backoff,
    /// Give up once this much time has passed, even mid-sleep or mid-fetch. `None` polls
    /// until a terminal status.
    pub timeout: Option<Duration>,
    /// Stops polling (including a sleep in progress) when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            timeout: Some(Duration::from_secs(120)),
            cancel: None,
        }
    }
}

impl PollOptions {
    /// Creates options with the default schedule and a 120 s timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay schedule.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the overall deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the deadline.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Polls `job_id` until its status is terminal.
///
/// Each iteration sleeps for the next backoff delay and then fetches the result.
/// `Pending` loops; any other status is returned as-is. Fetch errors (including an
/// unknown status) end polling immediately. The timeout bounds the whole run: a sleep
/// or fetch still in progress at the deadline is abandoned.
pub async fn poll_until_terminal<P>(
    provider: &P,
    job_id: &str,
    options: &PollOptions,
) -> Result<ResultResponse>
where
    P: ImageProvider + ?Sized,
{
    let start = Instant::now();
    let cancel = options.cancel.as_ref();
    let deadline = options.timeout.map(|timeout| (start + timeout, timeout));
    let mut attempt: u32 = 0;

    loop {
        if let Some((at, timeout)) = deadline {
            if Instant::now() >= at {
                return Err(FluxError::Timeout(timeout));
            }
        }

        let delay = options.backoff.delay(attempt);
        guarded(cancel, deadline, tokio::time::sleep(delay)).await?;

        let response = guarded(cancel, deadline, provider.fetch_result(job_id)).await??;
        tracing::debug!(
            job_id = %job_id,
            attempt,
            status = %response.status,
            delay_ms = delay.as_millis() as u64,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "polled generation result"
        );

        if response.status.is_terminal() {
            tracing::info!(job_id = %job_id, status = %response.status, "job finished");
            return Ok(response);
        }
        attempt = attempt.saturating_add(1);
    }
}

/// Runs `fut` until it completes, the token fires, or the deadline passes.
async fn guarded<F: Future>(
    cancel: Option<&CancellationToken>,
    deadline: Option<(Instant, Duration)>,
    fut: F,
) -> Result<F::Output> {
    match deadline {
        Some((at, timeout)) => cancellable(cancel, tokio::time::timeout_at(at, fut))
            .await?
            .map_err(|_| FluxError::Timeout(timeout)),
        None => cancellable(cancel, fut).await,
    }
}

async fn cancellable<F: Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(FluxError::Cancelled),
            out = fut => Ok(out),
        },
        None => Ok(fut.await),
    }
}
