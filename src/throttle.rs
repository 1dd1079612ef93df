//! Per-user request throttling.
//!
//! Each caller gets a sliding window of request timestamps. The configured
//! service worker is held to its own, usually higher, rate.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use thiserror::Error;

use crate::config::AppConfig;

/// Errors produced when parsing an `N/period` rate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThrottleRateError {
    #[error("rate must look like 'N/period'")]
    MissingSeparator,
    #[error("request count '{0}' is not a positive integer")]
    InvalidCount(String),
    #[error("period '{0}' must start with s, m, h or d")]
    InvalidPeriod(String),
}

/// Allowed number of requests per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRate {
    pub num_requests: usize,
    pub duration: Duration,
}

impl FromStr for ThrottleRate {
    type Err = ThrottleRateError;

    /// Only the first letter of the period is significant, so `min`,
    /// `minute` and `m` all mean sixty seconds.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (count, period) = value
            .split_once('/')
            .ok_or(ThrottleRateError::MissingSeparator)?;

        let num_requests = count
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ThrottleRateError::InvalidCount(count.to_string()))?;

        let seconds = match period.trim().chars().next() {
            Some('s') => 1,
            Some('m') => 60,
            Some('h') => 3_600,
            Some('d') => 86_400,
            _ => return Err(ThrottleRateError::InvalidPeriod(period.to_string())),
        };

        Ok(Self {
            num_requests,
            duration: Duration::from_secs(seconds),
        })
    }
}

/// Sliding-window throttle keyed by username.
pub struct Throttle {
    user_rate: ThrottleRate,
    service_user_rate: ThrottleRate,
    service_worker_username: String,
    history: Mutex<LruCache<String, VecDeque<Instant>>>,
}

impl Throttle {
    pub fn new(
        user_rate: ThrottleRate,
        service_user_rate: ThrottleRate,
        service_worker_username: impl Into<String>,
        capacity: NonZeroUsize,
    ) -> Self {
        Self {
            user_rate,
            service_user_rate,
            service_worker_username: service_worker_username.into(),
            history: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ThrottleRateError> {
        Ok(Self::new(
            config.throttle.user_rate.parse()?,
            config.throttle.service_user_rate.parse()?,
            config.service_worker_username.clone(),
            NonZeroUsize::new(config.throttle.cache_capacity).unwrap_or(NonZeroUsize::MIN),
        ))
    }

    fn rate_for(&self, username: &str) -> ThrottleRate {
        if username == self.service_worker_username {
            self.service_user_rate
        } else {
            self.user_rate
        }
    }

    /// Records a request for `username`. Returns the wait before the next
    /// request would be allowed when the caller is over its rate.
    pub fn check(&self, username: &str) -> Result<(), Duration> {
        self.check_at(username, Instant::now())
    }

    pub fn check_at(&self, username: &str, now: Instant) -> Result<(), Duration> {
        let rate = self.rate_for(username);
        let mut cache = self
            .history
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        let history = cache.get_or_insert_mut(username.to_string(), VecDeque::new);

        // Newest first; drop everything that fell out of the window.
        while let Some(oldest) = history.back() {
            if now.saturating_duration_since(*oldest) >= rate.duration {
                history.pop_back();
            } else {
                break;
            }
        }

        if history.len() >= rate.num_requests {
            let wait = history
                .back()
                .map(|oldest| rate.duration.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(rate.duration);
            tracing::debug!(username, wait_ms = wait.as_millis() as u64, "request throttled");
            return Err(wait);
        }

        history.push_front(now);
        Ok(())
    }
}

/// Whole seconds for a `Retry-After` header, never zero.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(user: &str, service: &str) -> Throttle {
        Throttle::new(
            user.parse().unwrap(),
            service.parse().unwrap(),
            "enterprise_worker",
            NonZeroUsize::new(16).unwrap(),
        )
    }

    #[test]
    fn test_parse_rates() {
        assert_eq!(
            "60/minute".parse::<ThrottleRate>().unwrap(),
            ThrottleRate {
                num_requests: 60,
                duration: Duration::from_secs(60)
            }
        );
        assert_eq!(
            "5/s".parse::<ThrottleRate>().unwrap().duration,
            Duration::from_secs(1)
        );
        assert_eq!(
            "1000/day".parse::<ThrottleRate>().unwrap().duration,
            Duration::from_secs(86_400)
        );
        assert_eq!(
            "10".parse::<ThrottleRate>(),
            Err(ThrottleRateError::MissingSeparator)
        );
        assert!(matches!(
            "0/hour".parse::<ThrottleRate>(),
            Err(ThrottleRateError::InvalidCount(_))
        ));
        assert!(matches!(
            "10/week".parse::<ThrottleRate>(),
            Err(ThrottleRateError::InvalidPeriod(_))
        ));
    }

    #[test]
    fn test_user_throttled_after_rate_exhausted() {
        let throttle = throttle("2/minute", "100/minute");
        let start = Instant::now();

        assert!(throttle.check_at("learner", start).is_ok());
        assert!(throttle.check_at("learner", start + Duration::from_secs(1)).is_ok());

        let wait = throttle
            .check_at("learner", start + Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(wait, Duration::from_secs(50));

        // Other users keep their own window.
        assert!(throttle.check_at("someone-else", start).is_ok());
    }

    #[test]
    fn test_window_slides() {
        let throttle = throttle("1/second", "100/minute");
        let start = Instant::now();

        assert!(throttle.check_at("learner", start).is_ok());
        assert!(throttle.check_at("learner", start + Duration::from_millis(500)).is_err());
        assert!(throttle.check_at("learner", start + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_service_worker_uses_service_rate() {
        let throttle = throttle("1/minute", "3/minute");
        let start = Instant::now();

        for _ in 0..3 {
            assert!(throttle.check_at("enterprise_worker", start).is_ok());
        }
        assert!(throttle.check_at("enterprise_worker", start).is_err());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(50)), 50);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
