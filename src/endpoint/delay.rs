//! Reconnect delay policies
//!
//! A policy maps an attempt number (starting at 1) to a delay. Policies are
//! stateless; the endpoint owns the attempt counter.

use std::time::Duration;

use rand::Rng;

use super::config::ReconnectDelayConfig;

/// Backoff policy consulted before every scheduled reconnect
pub trait Delay: Send + Sync + std::fmt::Debug {
    fn calculate(&self, attempt: u64) -> Duration;
}

/// Same delay for every attempt
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Delay for FixedDelay {
    fn calculate(&self, _attempt: u64) -> Duration {
        self.0
    }
}

/// Exponential growth with a cap and optional ±jitter
#[derive(Debug, Clone)]
pub struct ExponentialDelay {
    base_ms: u64,
    max_ms: u64,
    multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialDelay {
    pub fn new(base_ms: u64, max_ms: u64, multiplier: f64) -> Self {
        Self {
            base_ms,
            max_ms,
            multiplier,
            jitter_factor: 0.0,
        }
    }

    /// Jitter as a fraction of the capped delay (e.g. 0.3 for ±30%)
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    pub fn from_config(cfg: &ReconnectDelayConfig) -> Self {
        Self::new(cfg.base_ms, cfg.max_ms, cfg.multiplier).with_jitter(cfg.jitter_factor)
    }

    fn capped_ms(&self, attempt: u64) -> f64 {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u64) as i32;
        let base = (self.base_ms as f64) * self.multiplier.powi(exp);
        base.min(self.max_ms as f64)
    }
}

impl Delay for ExponentialDelay {
    fn calculate(&self, attempt: u64) -> Duration {
        let capped = self.capped_ms(attempt);
        if self.jitter_factor == 0.0 {
            return Duration::from_millis(capped as u64);
        }

        let jitter_range = capped * self.jitter_factor;
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        let final_ms = (capped + jitter).max(self.base_ms as f64);
        Duration::from_millis(final_ms as u64)
    }
}
