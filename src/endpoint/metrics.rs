//! Endpoint counters for monitoring

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct EndpointMetrics {
    pub connect_attempts: AtomicU64,
    pub connect_successes: AtomicU64,
    pub connect_failures: AtomicU64,
    pub retries_scheduled: AtomicU64,
    pub config_reloads: AtomicU64,
    pub redirects: AtomicU64,
    pub not_connected_rejections: AtomicU64,
    pub inactive_events: AtomicU64,
    pub discarded_connects: AtomicU64,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connect_success(&self) {
        self.connect_successes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_config_reload(&self) {
        self.config_reloads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_redirect(&self) {
        self.redirects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_not_connected(&self) {
        self.not_connected_rejections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_inactive(&self) {
        self.inactive_events.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_discarded_connect(&self) {
        self.discarded_connects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EndpointMetricsSnapshot {
        EndpointMetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_successes: self.connect_successes.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            config_reloads: self.config_reloads.load(Ordering::Relaxed),
            redirects: self.redirects.load(Ordering::Relaxed),
            not_connected_rejections: self.not_connected_rejections.load(Ordering::Relaxed),
            inactive_events: self.inactive_events.load(Ordering::Relaxed),
            discarded_connects: self.discarded_connects.load(Ordering::Relaxed),
        }
    }

    /// Summary string for logging
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "connects={}/{} failures={} retries={} reloads={} redirects={} not_connected={} inactive={} discarded={}",
            s.connect_successes,
            s.connect_attempts,
            s.connect_failures,
            s.retries_scheduled,
            s.config_reloads,
            s.redirects,
            s.not_connected_rejections,
            s.inactive_events,
            s.discarded_connects,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointMetricsSnapshot {
    pub connect_attempts: u64,
    pub connect_successes: u64,
    pub connect_failures: u64,
    pub retries_scheduled: u64,
    pub config_reloads: u64,
    pub redirects: u64,
    pub not_connected_rejections: u64,
    pub inactive_events: u64,
    pub discarded_connects: u64,
}
