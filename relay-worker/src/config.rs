//! Worker configuration
//!
//! Defines the tuning parameters of a job worker: how many jobs it keeps
//! active, how many it handles at once, how often it polls, and what it
//! asks the engine for.

use std::str::FromStr;
use std::time::Duration;

use relay_client::DEFAULT_REQUEST_TIMEOUT;
use relay_core::dto::job::{DEFAULT_JOB_TIMEOUT, DEFAULT_JOB_WORKER_NAME};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::{Result, WorkerError};

/// Default maximum number of jobs active on the client at once
pub const DEFAULT_MAX_JOBS_ACTIVE: usize = 32;

/// Default number of concurrent handler invocations
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default maximum interval between two activation requests
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default fraction of free capacity that triggers an early poll
pub const DEFAULT_POLL_THRESHOLD: f64 = 0.3;

/// Largest local job buffer a bounded Tokio channel can hold
pub const MAX_JOBS_ACTIVE_LIMIT: usize = Semaphore::MAX_PERMITS;

/// Longest accepted poll interval
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Job worker configuration
///
/// Numeric values that are out of range are not rejected; [`sanitize`](Self::sanitize)
/// replaces them with defaults and logs a warning for each one.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Worker name reported to the engine on activation
    pub name: String,

    /// Lease the engine grants on every activated job
    pub timeout: Duration,

    /// Timeout of a single activation call
    pub request_timeout: Duration,

    /// Capacity of the local job buffer
    pub max_jobs_active: usize,

    /// Number of handler invocations running at once
    pub concurrency: usize,

    /// Maximum time between two activation requests
    pub poll_interval: Duration,

    /// Fraction of `max_jobs_active` that must be free before a finished
    /// job triggers a poll ahead of the interval, in (0, 1]
    pub poll_threshold: f64,

    /// Variables to fetch with each job, empty fetches all
    pub fetch_variables: Vec<String>,

    /// Tenants to activate jobs for, empty uses the gateway default
    pub tenant_ids: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_JOB_WORKER_NAME.to_string(),
            timeout: DEFAULT_JOB_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_jobs_active: DEFAULT_MAX_JOBS_ACTIVE,
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_threshold: DEFAULT_POLL_THRESHOLD,
            fetch_variables: Vec::new(),
            tenant_ids: Vec::new(),
        }
    }
}

impl WorkerConfig {
    /// Creates configuration from environment variables
    ///
    /// Every variable is optional and falls back to its default:
    /// - RELAY_WORKER_NAME
    /// - RELAY_WORKER_TIMEOUT_MS
    /// - RELAY_REQUEST_TIMEOUT_MS
    /// - RELAY_MAX_JOBS_ACTIVE
    /// - RELAY_CONCURRENCY
    /// - RELAY_POLL_INTERVAL_MS
    /// - RELAY_POLL_THRESHOLD
    ///
    /// A variable that is set but cannot be parsed is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let millis = |key: &str, default: Duration| -> Result<Duration> {
            Ok(parse_var::<u64>(&lookup, key)?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };
        let count = |key: &str, default: usize| -> Result<usize> {
            Ok(parse_var::<usize>(&lookup, key)?.unwrap_or(default))
        };

        Ok(Self {
            name: lookup("RELAY_WORKER_NAME").unwrap_or(defaults.name),
            timeout: millis("RELAY_WORKER_TIMEOUT_MS", defaults.timeout)?,
            request_timeout: millis("RELAY_REQUEST_TIMEOUT_MS", defaults.request_timeout)?,
            max_jobs_active: count("RELAY_MAX_JOBS_ACTIVE", defaults.max_jobs_active)?,
            concurrency: count("RELAY_CONCURRENCY", defaults.concurrency)?,
            poll_interval: millis("RELAY_POLL_INTERVAL_MS", defaults.poll_interval)?,
            poll_threshold: parse_var::<f64>(&lookup, "RELAY_POLL_THRESHOLD")?
                .unwrap_or(defaults.poll_threshold),
            fetch_variables: defaults.fetch_variables,
            tenant_ids: defaults.tenant_ids,
        })
    }

    /// Replaces invalid tuning values with defaults
    ///
    /// Never fails: each replaced value is logged as a warning.
    pub fn sanitize(mut self) -> Self {
        let defaults = Self::default();

        if !valid_max_jobs_active(self.max_jobs_active) {
            warn!(
                "Ignoring invalid max jobs active {}, it must be in 1..={}; using {}",
                self.max_jobs_active, MAX_JOBS_ACTIVE_LIMIT, defaults.max_jobs_active
            );
            self.max_jobs_active = defaults.max_jobs_active;
        }

        if self.concurrency == 0 {
            warn!(
                "Ignoring invalid concurrency {}, it must be greater than zero; using {}",
                self.concurrency, defaults.concurrency
            );
            self.concurrency = defaults.concurrency;
        }

        if !valid_poll_interval(self.poll_interval) {
            warn!(
                "Ignoring invalid poll interval {:?}, it must be in (0, {:?}]; using {:?}",
                self.poll_interval, MAX_POLL_INTERVAL, defaults.poll_interval
            );
            self.poll_interval = defaults.poll_interval;
        }

        if !valid_poll_threshold(self.poll_threshold) {
            warn!(
                "Ignoring invalid poll threshold {}, it must be in (0, 1]; using {}",
                self.poll_threshold, defaults.poll_threshold
            );
            self.poll_threshold = defaults.poll_threshold;
        }

        if self.request_timeout.is_zero() {
            warn!(
                "Ignoring invalid request timeout {:?}, it must be greater than zero; using {:?}",
                self.request_timeout, defaults.request_timeout
            );
            self.request_timeout = defaults.request_timeout;
        }

        self
    }

    /// Number of free buffer slots needed before a finished job triggers a poll
    pub fn threshold(&self) -> usize {
        (self.max_jobs_active as f64 * self.poll_threshold).round() as usize
    }
}

/// Reads `key` through `lookup`; unset is `None`, unparsable is an error
fn parse_var<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| WorkerError::Config(format!("{key} has an invalid value: {raw:?}"))),
    }
}

pub(crate) fn valid_max_jobs_active(max_jobs_active: usize) -> bool {
    (1..=MAX_JOBS_ACTIVE_LIMIT).contains(&max_jobs_active)
}

pub(crate) fn valid_poll_interval(poll_interval: Duration) -> bool {
    !poll_interval.is_zero() && poll_interval <= MAX_POLL_INTERVAL
}

pub(crate) fn valid_poll_threshold(threshold: f64) -> bool {
    threshold > 0.0 && threshold <= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.name, "default");
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.max_jobs_active, 32);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.poll_threshold, 0.3);
        assert_eq!(config.clone().sanitize(), config);
    }

    #[test]
    fn test_threshold_rounds() {
        let mut config = WorkerConfig::default();
        assert_eq!(config.threshold(), 10);

        for (capacity, fraction, expected) in [(10, 0.3, 3), (1, 0.3, 0), (5, 0.5, 3), (7, 1.0, 7)]
        {
            config.max_jobs_active = capacity;
            config.poll_threshold = fraction;
            assert_eq!(config.threshold(), expected, "{capacity} x {fraction}");
        }
    }

    #[test]
    fn test_sanitize_replaces_invalid_values() {
        let config = WorkerConfig {
            max_jobs_active: 0,
            concurrency: 0,
            poll_interval: Duration::ZERO,
            poll_threshold: 1.5,
            request_timeout: Duration::ZERO,
            ..WorkerConfig::default()
        }
        .sanitize();

        assert_eq!(config, WorkerConfig::default());
    }

    #[test]
    fn test_sanitize_rejects_non_positive_threshold() {
        for threshold in [0.0, -0.2, f64::NAN] {
            let config = WorkerConfig {
                poll_threshold: threshold,
                ..WorkerConfig::default()
            }
            .sanitize();
            assert_eq!(config.poll_threshold, DEFAULT_POLL_THRESHOLD);
        }
    }

    #[test]
    fn test_from_lookup() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("RELAY_WORKER_NAME", "billing"),
            ("RELAY_MAX_JOBS_ACTIVE", "10"),
            ("RELAY_CONCURRENCY", "2"),
            ("RELAY_POLL_INTERVAL_MS", "250"),
            ("RELAY_POLL_THRESHOLD", "0.5"),
        ]))
        .unwrap();

        assert_eq!(config.name, "billing");
        assert_eq!(config.max_jobs_active, 10);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.poll_threshold, 0.5);
        assert_eq!(config.timeout, DEFAULT_JOB_TIMEOUT);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = WorkerConfig::from_lookup(lookup(&[("RELAY_CONCURRENCY", "many")])).unwrap_err();
        assert!(matches!(err, WorkerError::Config(_)));
    }

    #[test]
    fn test_from_lookup_rejects_fractional_and_negative_counts() {
        for (key, value) in [
            ("RELAY_CONCURRENCY", "2.9"),
            ("RELAY_MAX_JOBS_ACTIVE", "-4"),
            ("RELAY_POLL_INTERVAL_MS", "1e30"),
            ("RELAY_WORKER_TIMEOUT_MS", "-1"),
        ] {
            let result = WorkerConfig::from_lookup(lookup(&[(key, value)]));
            assert!(
                matches!(result, Err(WorkerError::Config(_))),
                "{key}={value} was accepted"
            );
        }
    }

    #[test]
    fn test_sanitize_caps_oversized_values() {
        let config = WorkerConfig {
            max_jobs_active: usize::MAX,
            poll_interval: Duration::MAX,
            ..WorkerConfig::default()
        }
        .sanitize();

        assert_eq!(config.max_jobs_active, DEFAULT_MAX_JOBS_ACTIVE);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);

        let config = WorkerConfig {
            max_jobs_active: MAX_JOBS_ACTIVE_LIMIT,
            poll_interval: MAX_POLL_INTERVAL,
            ..WorkerConfig::default()
        }
        .sanitize();

        assert_eq!(config.max_jobs_active, MAX_JOBS_ACTIVE_LIMIT);
        assert_eq!(config.poll_interval, MAX_POLL_INTERVAL);
    }
}
