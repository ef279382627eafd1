//! Exponential backoff with jitter for endpoint reconnection, reset on
//! a successful subscription ack. The Multiplexer retries connect
//! errors indefinitely at backoff until cancelled — `max_attempts` and
//! `max_total_duration` exist for the rare caller that wants a ceiling,
//! but the default leaves both unbounded.

use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconnectError {
    #[error("maximum reconnection attempts exceeded ({0})")]
    MaxAttemptsExceeded(usize),
    #[error("reconnection budget exhausted after {0:?}")]
    BudgetExhausted(Duration),
}

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_attempts: Option<usize>,
    pub max_total_duration: Option<Duration>,
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: None,
            max_total_duration: None,
            jitter: true,
        }
    }
}

impl ReconnectConfig {
    pub fn new(initial_delay: Duration, max_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            backoff_multiplier,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_total_duration(mut self, max_duration: Option<Duration>) -> Self {
        self.max_total_duration = max_duration;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay.is_zero() {
            return Err("initial delay must be greater than zero".to_string());
        }
        if self.max_delay < self.initial_delay {
            return Err("max delay must be >= initial delay".to_string());
        }
        if self.backoff_multiplier <= 1.0 {
            return Err("backoff multiplier must be > 1.0".to_string());
        }
        if let Some(0) = self.max_attempts {
            return Err("max attempts must be > 0 if specified".to_string());
        }
        Ok(())
    }
}

/// Tracks attempt count, elapsed time, and the current backoff delay
/// for one endpoint's reconnect sequence. `reset()` on a successful
/// subscription ack.
#[derive(Debug)]
pub struct ReconnectHandler {
    config: ReconnectConfig,
    attempt_count: usize,
    start_time: Option<Instant>,
    current_delay: Duration,
}

impl ReconnectHandler {
    pub fn new(config: ReconnectConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            current_delay: config.initial_delay,
            config,
            attempt_count: 0,
            start_time: None,
        })
    }

    pub fn with_default() -> Self {
        Self::new(ReconnectConfig::default()).expect("default configuration is valid")
    }

    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.start_time = None;
        self.current_delay = self.config.initial_delay;
    }

    pub fn should_reconnect(&mut self) -> Result<Duration, ReconnectError> {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }

        if let Some(max_attempts) = self.config.max_attempts {
            if self.attempt_count >= max_attempts {
                return Err(ReconnectError::MaxAttemptsExceeded(max_attempts));
            }
        }

        if let Some(max_duration) = self.config.max_total_duration {
            if let Some(start_time) = self.start_time {
                if start_time.elapsed() >= max_duration {
                    return Err(ReconnectError::BudgetExhausted(max_duration));
                }
            }
        }

        self.attempt_count += 1;
        let delay = self.calculate_delay();
        self.update_delay();
        Ok(delay)
    }

    pub fn attempt_count(&self) -> usize {
        self.attempt_count
    }

    pub fn elapsed_time(&self) -> Option<Duration> {
        self.start_time.map(|start| start.elapsed())
    }

    fn calculate_delay(&self) -> Duration {
        if self.config.jitter {
            self.add_jitter(self.current_delay)
        } else {
            self.current_delay
        }
    }

    fn update_delay(&mut self) {
        let next_ms = (self.current_delay.as_millis() as f64 * self.config.backoff_multiplier) as u64;
        self.current_delay = Duration::from_millis(next_ms).min(self.config.max_delay);
    }

    /// Hash-based pseudo-random jitter, deterministic given the attempt
    /// count — no `rand` dependency for a ±10% wobble.
    fn add_jitter(&self, delay: Duration) -> Duration {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.attempt_count.hash(&mut hasher);
        let hash = hasher.finish();

        let jitter_percent = ((hash % 20) as f64 - 10.0) / 100.0;
        let jitter_ms = (delay.as_millis() as f64 * jitter_percent) as i64;
        let jittered_ms = (delay.as_millis() as i64 + jitter_ms).max(0) as u64;
        Duration::from_millis(jittered_ms)
    }
}
