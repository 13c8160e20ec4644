//! Endpoint lifecycle engine
//!
//! An [`Endpoint`] is one logical connection to one server node for one
//! bucket. It owns the lifecycle state machine, drives connects and
//! reconnects with backoff, gates outbound requests on the current state and
//! restarts itself when the channel goes away.
//!
//! State flow:
//! - DISCONNECTED --connect()--> CONNECTING --success--> CONNECTED
//! - CONNECTING --failure, persistent--> CONNECTING (after backoff)
//! - CONNECTING --terminal failure / transient--> DISCONNECTED
//! - CONNECTED --disconnect()--> DISCONNECTING --> DISCONNECTED
//! - CONNECTED --channel inactive--> DISCONNECTED --> CONNECTING
//!
//! `disconnect()` is final: the sticky disconnected flag breaks every retry
//! loop and turns any later connect() into a no-op.

pub mod config;
mod connect;
pub mod delay;
mod dispatch;
pub mod error;
mod inactive;
pub mod metrics;
pub mod notification;
pub mod state;

pub use config::{EndpointConfig, Environment, ReconnectDelayConfig};
pub use delay::{Delay, ExponentialDelay, FixedDelay};
pub use error::{EndpointError, NOT_CONNECTED};
pub use metrics::{EndpointMetrics, EndpointMetricsSnapshot};
pub use notification::{Completer, Notification};
pub use state::{LifecycleState, StateChange, StateMachine};

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::message::EventSink;
use crate::transport::{Channel, EndpointAddress, PipelineCustomizer, TransportConnector};

/// Bucket credential; the password never shows up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fixed identity of an endpoint
#[derive(Debug, Clone)]
pub struct EndpointIdentity {
    pub address: EndpointAddress,
    pub bucket: String,
    pub credential: Credential,
    /// Serves one exchange, then torn down; never reconnects
    pub transient: bool,
}

/// A single logical connection to one node for one bucket
pub struct Endpoint {
    identity: EndpointIdentity,
    env: Environment,
    connector: Arc<dyn TransportConnector>,
    sink: Arc<dyn EventSink>,
    stages: Arc<dyn PipelineCustomizer>,
    lifecycle: StateMachine,
    channel: RwLock<Option<Arc<dyn Channel>>>,
    has_written: AtomicBool,
    disconnected: AtomicBool,
    reconnect_attempt: AtomicU64,
    /// Bumped whenever a new connect chain starts; stale attempts and
    /// retries compare against it and drop themselves
    epoch: AtomicU64,
    metrics: EndpointMetrics,
}

impl Endpoint {
    pub fn builder(address: EndpointAddress, bucket: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(address, bucket)
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Every subsequent state transition
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.lifecycle.subscribe()
    }

    pub fn identity(&self) -> &EndpointIdentity {
        &self.identity
    }

    pub fn bucket(&self) -> &str {
        &self.identity.bucket
    }

    pub fn is_transient(&self) -> bool {
        self.identity.transient
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn metrics(&self) -> &EndpointMetrics {
        &self.metrics
    }

    /// True once disconnect() was requested
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Next attempt number the reconnect policy will see
    pub fn reconnect_attempt(&self) -> u64 {
        self.reconnect_attempt.load(Ordering::SeqCst)
    }

    pub fn has_channel(&self) -> bool {
        self.channel.read().is_some()
    }

    fn current_channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel.read().clone()
    }

    fn clear_channel(&self) {
        *self.channel.write() = None;
    }

    fn transition(&self, next: LifecycleState) {
        let prev = self.lifecycle.transition(next);
        self.log_transition(prev, next);
    }

    /// Transition only if the state still is `expected`
    fn transition_from(&self, expected: LifecycleState, next: LifecycleState) -> bool {
        match self.lifecycle.compare_and_transition(expected, next) {
            Ok(()) => {
                self.log_transition(expected, next);
                true
            }
            Err(_) => false,
        }
    }

    fn log_transition(&self, from: LifecycleState, to: LifecycleState) {
        if from != to {
            debug!(
                address = %self.identity.address,
                bucket = %self.identity.bucket,
                from = %from,
                to = %to,
                "endpoint_transition"
            );
        }
    }

    /// `[remote][bucket]` prefix, taken from the live channel if any
    fn log_ident(&self) -> String {
        let remote = self
            .current_channel()
            .and_then(|c| c.remote_addr())
            .map(|a| a.to_string())
            .unwrap_or_else(|| "null".to_string());
        format!("[{}][{}]", remote, self.identity.bucket)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("disconnected", &self.is_disconnected())
            .field("reconnect_attempt", &self.reconnect_attempt())
            .finish()
    }
}

/// Assembles an [`Endpoint`]
pub struct EndpointBuilder {
    address: EndpointAddress,
    bucket: String,
    credential: Credential,
    transient: bool,
    env: Option<Environment>,
    connector: Option<Arc<dyn TransportConnector>>,
    sink: Option<Arc<dyn EventSink>>,
    stages: Arc<dyn PipelineCustomizer>,
}

impl EndpointBuilder {
    pub fn new(address: EndpointAddress, bucket: impl Into<String>) -> Self {
        Self {
            address,
            bucket: bucket.into(),
            credential: Credential::new("", ""),
            transient: false,
            env: None,
            connector: None,
            sink: None,
            stages: Arc::new(()),
        }
    }

    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn TransportConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Variant-specific pipeline stages
    pub fn stages(mut self, stages: Arc<dyn PipelineCustomizer>) -> Self {
        self.stages = stages;
        self
    }

    pub fn build(self) -> anyhow::Result<Arc<Endpoint>> {
        let env = self
            .env
            .ok_or_else(|| anyhow::anyhow!("endpoint environment is required"))?;
        let connector = self
            .connector
            .ok_or_else(|| anyhow::anyhow!("transport connector is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("event sink is required"))?;

        if env.config().tls_enabled && env.tls().is_none() {
            anyhow::bail!("tls is enabled but no tls negotiator was configured");
        }

        debug!(
            address = %self.address,
            bucket = %self.bucket,
            grace_period_ms = env.config().connect_callback_grace_period_ms,
            "endpoint_created"
        );

        Ok(Arc::new(Endpoint {
            identity: EndpointIdentity {
                address: self.address,
                bucket: self.bucket,
                credential: self.credential,
                transient: self.transient,
            },
            env,
            connector,
            sink,
            stages: self.stages,
            lifecycle: StateMachine::new(LifecycleState::Disconnected),
            channel: RwLock::new(None),
            has_written: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            reconnect_attempt: AtomicU64::new(1),
            epoch: AtomicU64::new(0),
            metrics: EndpointMetrics::new(),
        }))
    }
}

/// Pointer identity for trait-object channels
fn same_channel(a: &Arc<dyn Channel>, b: &Arc<dyn Channel>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
