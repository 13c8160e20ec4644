//! Endpoint configuration and runtime environment
//!
//! `EndpointConfig` is the serializable part (TOML file + env overrides).
//! `Environment` adds the pieces that cannot be serialized: the reconnect
//! policy, the TLS negotiator and the I/O runtime handle.

use std::{path::Path, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use super::delay::{Delay, ExponentialDelay};
use crate::transport::TlsNegotiator;

/// Serializable endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Socket connect timeout handed to the connector
    #[serde(default = "default_socket_connect_timeout_ms")]
    pub socket_connect_timeout_ms: u64,

    /// Extra time on top of the socket timeout before the safeguard fires
    #[serde(default = "default_connect_callback_grace_period_ms")]
    pub connect_callback_grace_period_ms: u64,

    #[serde(default)]
    pub tls_enabled: bool,

    #[serde(default = "default_true")]
    pub buffer_pooling_enabled: bool,

    #[serde(default = "default_true")]
    pub tcp_nodelay_enabled: bool,

    /// Reconnect backoff parameters
    #[serde(default)]
    pub reconnect: ReconnectDelayConfig,
}

fn default_socket_connect_timeout_ms() -> u64 {
    1_000
}

fn default_connect_callback_grace_period_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            socket_connect_timeout_ms: default_socket_connect_timeout_ms(),
            connect_callback_grace_period_ms: default_connect_callback_grace_period_ms(),
            tls_enabled: false,
            buffer_pooling_enabled: true,
            tcp_nodelay_enabled: true,
            reconnect: ReconnectDelayConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load from `ENDPOINT_CONFIG_PATH` (or defaults), then apply env overrides
    pub fn from_env() -> Self {
        let path = std::env::var("ENDPOINT_CONFIG_PATH")
            .unwrap_or_else(|_| "endpoint_config.toml".to_string());

        let mut config = Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default endpoint config ({}): {}", path, e);
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ENDPOINT_SOCKET_CONNECT_TIMEOUT_MS") {
            self.socket_connect_timeout_ms = v.parse().unwrap_or(self.socket_connect_timeout_ms);
        }
        if let Ok(v) = std::env::var("ENDPOINT_CONNECT_CALLBACK_GRACE_PERIOD_MS") {
            self.connect_callback_grace_period_ms =
                v.parse().unwrap_or(self.connect_callback_grace_period_ms);
        }
        if let Ok(v) = std::env::var("ENDPOINT_TLS_ENABLED") {
            self.tls_enabled = v.parse().unwrap_or(self.tls_enabled);
        }
        if let Ok(v) = std::env::var("ENDPOINT_TCP_NODELAY") {
            self.tcp_nodelay_enabled = v.parse().unwrap_or(self.tcp_nodelay_enabled);
        }
        if let Ok(v) = std::env::var("ENDPOINT_BUFFER_POOLING") {
            self.buffer_pooling_enabled = v.parse().unwrap_or(self.buffer_pooling_enabled);
        }
    }

    pub fn socket_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_connect_timeout_ms)
    }

    pub fn connect_callback_grace_period(&self) -> Duration {
        Duration::from_millis(self.connect_callback_grace_period_ms)
    }

    /// Upper bound for a single connect attempt before the safeguard fires
    pub fn connect_safeguard_timeout(&self) -> Duration {
        self.socket_connect_timeout() + self.connect_callback_grace_period()
    }
}

/// Exponential reconnect backoff parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectDelayConfig {
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub jitter_factor: f64,
}

fn default_base_ms() -> u64 {
    32
}

fn default_max_ms() -> u64 {
    4_096
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectDelayConfig {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            multiplier: default_multiplier(),
            jitter_factor: 0.0,
        }
    }
}

/// Everything an endpoint needs from its surroundings
#[derive(Clone)]
pub struct Environment {
    config: EndpointConfig,
    reconnect_delay: Arc<dyn Delay>,
    tls: Option<Arc<dyn TlsNegotiator>>,
    io_pool: Handle,
}

impl Environment {
    /// Build from config, running retries and callbacks on `io_pool`
    pub fn new(config: EndpointConfig, io_pool: Handle) -> Self {
        let reconnect_delay = Arc::new(ExponentialDelay::from_config(&config.reconnect));
        Self {
            config,
            reconnect_delay,
            tls: None,
            io_pool,
        }
    }

    /// Build from config using the ambient tokio runtime
    pub fn from_config(config: EndpointConfig) -> anyhow::Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| anyhow::anyhow!("endpoint environment needs a tokio runtime: {}", e))?;
        Ok(Self::new(config, handle))
    }

    pub fn with_reconnect_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_tls(mut self, negotiator: Arc<dyn TlsNegotiator>) -> Self {
        self.tls = Some(negotiator);
        self
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn reconnect_delay(&self) -> &Arc<dyn Delay> {
        &self.reconnect_delay
    }

    pub fn tls(&self) -> Option<&Arc<dyn TlsNegotiator>> {
        self.tls.as_ref()
    }

    pub fn io_pool(&self) -> &Handle {
        &self.io_pool
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}
