//! Readiness gating - await a predicate with bounded backoff
//!
//! `poll_until` knows nothing about what it checks. `HttpProbe` is the
//! predicate the supervisor uses: any HTTP response from the endpoint counts
//! as ready, the payload is never inspected.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::ReadinessConfig;

/// Retry budget for a readiness wait
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Sleep before the first attempt
    pub initial_delay: Duration,
    /// Delay after the first failed attempt
    pub interval: Duration,
    /// Upper bound for any single delay
    pub max_interval: Duration,
    /// Growth factor applied per failed attempt
    pub multiplier: f64,
    pub max_attempts: u32,
    /// An attempt that takes longer than this counts as failed
    pub attempt_timeout: Duration,
    /// Total wall-clock budget, initial delay included
    pub deadline: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&ReadinessConfig::default())
    }
}

impl From<&ReadinessConfig> for BackoffPolicy {
    fn from(config: &ReadinessConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            interval: Duration::from_millis(config.interval_ms),
            max_interval: Duration::from_millis(config.max_interval_ms),
            multiplier: config.multiplier,
            max_attempts: config.max_attempts,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            deadline: Duration::from_millis(config.deadline_ms),
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = (self.interval.as_millis() as f64 * factor).min(self.max_interval.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Result of a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub ready: bool,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Repeatedly evaluate `check` until it returns true or the budget runs out.
///
/// Stops after `max_attempts` attempts, or earlier when the next delay would
/// cross the deadline.
pub async fn poll_until<F, Fut>(policy: &BackoffPolicy, mut check: F) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    tokio::time::sleep(policy.initial_delay).await;

    while attempts < max_attempts {
        attempts += 1;

        let ready = tokio::time::timeout(policy.attempt_timeout, check()).await.unwrap_or(false);
        if ready {
            tracing::debug!(attempts, elapsed_ms = start.elapsed().as_millis() as u64, "Predicate satisfied");
            return PollOutcome {
                ready: true,
                attempts,
                elapsed: start.elapsed(),
            };
        }

        if attempts == max_attempts {
            break;
        }

        let delay = policy.delay_for(attempts);
        if start.elapsed() + delay > policy.deadline {
            tracing::debug!(attempts, "Readiness deadline reached");
            break;
        }

        tracing::debug!(attempts, delay_ms = delay.as_millis() as u64, "Not ready, backing off");
        tokio::time::sleep(delay).await;
    }

    PollOutcome {
        ready: false,
        attempts,
        elapsed: start.elapsed(),
    }
}

/// A liveness check against some service
#[async_trait]
pub trait Probe: Send + Sync {
    /// One attempt; true when the service answered
    async fn check(&self) -> bool;

    /// What is being probed, for messages
    fn target(&self) -> String;
}

/// Plain GET against a local HTTP endpoint
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Client with a per-request `timeout`. If the client cannot be built the
    /// default client is used and the timeout comes from `poll_until` alone.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                log::warn!("[probe] HTTP client with {:?} timeout unavailable, using defaults: {}", timeout, e);
                reqwest::Client::new()
            }
        };
        Self { url: url.into(), client }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                log::debug!("[probe] {} answered {}", self.url, response.status());
                true
            }
            Err(e) => {
                log::debug!("[probe] {} unreachable: {}", self.url, e);
                false
            }
        }
    }

    fn target(&self) -> String {
        self.url.clone()
    }
}

/// Poll `probe` under `policy`
pub async fn wait_for_readiness(probe: &dyn Probe, policy: &BackoffPolicy) -> PollOutcome {
    poll_until(policy, || probe.check()).await
}
