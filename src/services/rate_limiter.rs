// src/services/rate_limiter.rs

//! Sliding-window admission control for outbound requests.
//!
//! One [`RateLimiter`] exists per site. It keeps the instants of the
//! reservations made inside the current window; a request is admitted
//! while fewer than `quota` of them are no older than `window`.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::{AppError, Result};
use crate::models::{LimiterConfig, SiteLimits};
use crate::utils::jitter;

/// Timing of [`RateLimiter::acquire`].
#[derive(Debug, Clone, Copy)]
pub struct AcquirePolicy {
    /// Sleep between two attempts while the window is full
    pub poll_interval: Duration,

    /// Fail once waiting took longer than this
    pub max_wait: Duration,

    /// Upper bound of the random sleep before every attempt
    pub pre_jitter: Duration,

    /// Random sleep range after an admission that had to wait
    pub post_wait_jitter: (Duration, Duration),
}

impl Default for AcquirePolicy {
    fn default() -> Self {
        Self::from(&LimiterConfig::default())
    }
}

impl From<&LimiterConfig> for AcquirePolicy {
    fn from(config: &LimiterConfig) -> Self {
        let [low, high] = config.post_wait_jitter_secs;
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
            pre_jitter: Duration::from_millis(config.pre_jitter_ms),
            post_wait_jitter: (Duration::from_secs(low), Duration::from_secs(high)),
        }
    }
}

impl AcquirePolicy {
    /// Policy without random sleeps, polling every `poll_interval`.
    pub fn without_jitter(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
            pre_jitter: Duration::ZERO,
            post_wait_jitter: (Duration::ZERO, Duration::ZERO),
        }
    }
}

/// Per-site request limiter.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    policy: AcquirePolicy,
    reservations: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, policy: AcquirePolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            reservations: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until a request is permitted under `limits`, then reserve it.
    ///
    /// Returns [`AppError::RateLimitTimeout`] if no slot frees up within
    /// the policy's `max_wait`.
    pub async fn acquire(&self, limits: SiteLimits) -> Result<()> {
        let start = Instant::now();
        let mut waited = false;

        loop {
            sleep(jitter(Duration::ZERO, self.policy.pre_jitter)).await;

            if self.try_admit(limits, true) {
                if waited {
                    let (low, high) = self.policy.post_wait_jitter;
                    sleep(jitter(low, high)).await;
                }
                return Ok(());
            }

            waited = true;
            sleep(self.policy.poll_interval).await;

            if start.elapsed() > self.policy.max_wait {
                log::warn!(
                    "[{}] No request slot granted within {:?}",
                    self.name,
                    self.policy.max_wait
                );
                return Err(AppError::RateLimitTimeout {
                    site: self.name.clone(),
                    waited_secs: start.elapsed().as_secs(),
                });
            }
        }
    }

    /// Whether a request would be admitted right now. Reserves nothing.
    pub fn probe(&self, limits: SiteLimits) -> bool {
        self.try_admit(limits, false)
    }

    /// Number of reservations still inside `window`.
    pub fn in_flight(&self, window: Duration) -> usize {
        let mut queue = self
            .reservations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self::prune(&mut queue, window, Instant::now());
        queue.len()
    }

    fn try_admit(&self, limits: SiteLimits, reserve: bool) -> bool {
        let mut queue = self
            .reservations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        Self::prune(&mut queue, limits.window, now);

        let admitted = queue.len() < limits.quota;
        if reserve {
            log::debug!(
                "[{}] {} request: {} made within the last {:?}",
                self.name,
                if admitted { "Allowed" } else { "Deferred" },
                queue.len(),
                limits.window
            );
            if admitted {
                queue.push_back(now);
            }
        }
        admitted
    }

    fn prune(queue: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while queue
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) > window)
        {
            queue.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            "test",
            AcquirePolicy::without_jitter(Duration::from_secs(10), Duration::from_secs(600)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_admits_immediately() {
        let limiter = limiter();
        let limits = SiteLimits::new(Duration::from_secs(5), 2);
        let start = Instant::now();

        limiter.acquire(limits).await.unwrap();
        limiter.acquire(limits).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_flight(limits.window), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_acquire_waits_for_window() {
        let limiter = limiter();
        let limits = SiteLimits::new(Duration::from_secs(5), 2);
        let start = Instant::now();

        limiter.acquire(limits).await.unwrap();
        limiter.acquire(limits).await.unwrap();
        assert!(!limiter.probe(limits));

        limiter.acquire(limits).await.unwrap();
        assert!(start.elapsed() >= limits.window);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_does_not_reserve() {
        let limiter = limiter();
        let limits = SiteLimits::new(Duration::from_secs(5), 1);

        assert!(limiter.probe(limits));
        assert!(limiter.probe(limits));
        assert_eq!(limiter.in_flight(limits.window), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out() {
        let limiter = RateLimiter::new(
            "slow",
            AcquirePolicy::without_jitter(Duration::from_secs(10), Duration::from_secs(30)),
        );
        let limits = SiteLimits::new(Duration::from_secs(3600), 1);
        limiter.acquire(limits).await.unwrap();

        let err = limiter.acquire(limits).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimitTimeout { ref site, .. } if site == "slow"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiters_are_independent() {
        let a = limiter();
        let b = limiter();
        let limits = SiteLimits::new(Duration::from_secs(60), 1);

        a.acquire(limits).await.unwrap();
        assert!(!a.probe(limits));
        assert!(b.probe(limits));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_stays_in_bounds() {
        let limiter = RateLimiter::new(
            "jittery",
            AcquirePolicy {
                pre_jitter: Duration::from_secs(1),
                ..AcquirePolicy::without_jitter(Duration::from_secs(10), Duration::from_secs(600))
            },
        );
        let limits = SiteLimits::new(Duration::from_secs(60), 5);
        let start = Instant::now();

        limiter.acquire(limits).await.unwrap();
        assert!(start.elapsed() <= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reservation_counts_until_strictly_older_than_window() {
        let limiter = limiter();
        let limits = SiteLimits::new(Duration::from_secs(5), 1);

        limiter.acquire(limits).await.unwrap();
        tokio::time::advance(limits.window).await;
        assert!(!limiter.probe(limits));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.probe(limits));
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_wait_jitter_only_after_waiting() {
        let poll = Duration::from_secs(10);
        let limiter = RateLimiter::new(
            "patient",
            AcquirePolicy {
                post_wait_jitter: (Duration::from_secs(1), Duration::from_secs(60)),
                ..AcquirePolicy::without_jitter(poll, Duration::from_secs(600))
            },
        );
        let limits = SiteLimits::new(Duration::from_secs(5), 1);

        let start = Instant::now();
        limiter.acquire(limits).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        let start = Instant::now();
        limiter.acquire(limits).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= poll + Duration::from_secs(1), "{:?}", elapsed);
        assert!(elapsed <= poll + Duration::from_secs(60), "{:?}", elapsed);
    }
}
