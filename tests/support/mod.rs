//! Scripted transport doubles shared by the integration tests

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use dbclient_endpoint::{
    endpoint::{Delay, EndpointConfig, EndpointError, Environment},
    message::{EventSink, MessageRequest, ResponseEvent},
    transport::{Channel, ConnectOptions, EndpointAddress, PipelineCustomizer, TransportConnector},
    Endpoint,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbclient_endpoint=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// In-memory channel with controllable writability and liveness
pub struct MockChannel {
    active: AtomicBool,
    writable: AtomicBool,
    written: Mutex<Vec<MessageRequest>>,
    flushes: AtomicUsize,
    closes: AtomicUsize,
    closed_tx: watch::Sender<bool>,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        let (closed_tx, _) = watch::channel(false);
        Arc::new(Self {
            active: AtomicBool::new(true),
            writable: AtomicBool::new(true),
            written: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            closed_tx,
        })
    }

    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// Simulate the remote side going away
    pub fn drop_connection(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.closed_tx.send_replace(true);
    }

    pub fn written_payloads(&self) -> Vec<Vec<u8>> {
        self.written.lock().iter().map(|r| r.payload.clone()).collect()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn remote_addr(&self) -> Option<SocketAddr> {
        "127.0.0.1:11210".parse().ok()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::SeqCst)
    }

    fn write(&self, request: MessageRequest) {
        self.written.lock().push(request);
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self) -> Result<(), EndpointError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.drop_connection();
        Ok(())
    }

    async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// What the next connect call does
pub enum Outcome {
    Connect(Arc<MockChannel>),
    Fail(EndpointError),
    /// Never resolves
    Hang,
    Delayed(Duration, Box<Outcome>),
}

/// Connector that replays a script; hangs once the script runs out
pub struct MockConnector {
    script: Mutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<tokio::time::Instant>>,
    last_options: Mutex<Option<ConnectOptions>>,
}

impl MockConnector {
    pub fn new(script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            last_options: Mutex::new(None),
        })
    }

    pub fn push(&self, outcome: Outcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.call_times.lock().clone()
    }

    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.last_options.lock().clone()
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Channel>, EndpointError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(tokio::time::Instant::now());
        *self.last_options.lock() = Some(options.clone());

        let mut outcome = self.script.lock().pop_front().unwrap_or(Outcome::Hang);
        loop {
            match outcome {
                Outcome::Connect(channel) => return Ok(channel as Arc<dyn Channel>),
                Outcome::Fail(err) => return Err(err),
                Outcome::Hang => std::future::pending::<()>().await,
                Outcome::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    outcome = *next;
                }
            }
        }
    }
}

pub struct Harness {
    pub endpoint: Arc<Endpoint>,
    pub connector: Arc<MockConnector>,
    pub events: mpsc::Receiver<ResponseEvent>,
}

impl Harness {
    /// Drain the sink and count config reloads
    pub fn drain_reloads(&mut self) -> usize {
        let mut reloads = 0;
        while let Ok(event) = self.events.try_recv() {
            if event.is_config_reload() {
                reloads += 1;
            }
        }
        reloads
    }
}

pub struct HarnessOptions {
    pub config: EndpointConfig,
    pub transient: bool,
    pub sink_capacity: usize,
    pub delay: Option<Arc<dyn Delay>>,
    pub stages: Option<Arc<dyn PipelineCustomizer>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            config: EndpointConfig::default(),
            transient: false,
            sink_capacity: 64,
            delay: None,
            stages: None,
        }
    }
}

/// Must be called inside a tokio runtime
pub fn harness(script: Vec<Outcome>, transient: bool) -> Harness {
    harness_with(
        script,
        HarnessOptions {
            transient,
            ..Default::default()
        },
    )
}

pub fn harness_with(script: Vec<Outcome>, options: HarnessOptions) -> Harness {
    init_tracing();

    let connector = MockConnector::new(script);
    let (tx, events) = mpsc::channel(options.sink_capacity);
    let sink: Arc<dyn EventSink> = Arc::new(tx);

    let mut env = Environment::from_config(options.config).expect("runtime available");
    if let Some(delay) = options.delay {
        env = env.with_reconnect_delay(delay);
    }

    let mut builder = Endpoint::builder(EndpointAddress::new("127.0.0.1", 11210), "travel")
        .transient(options.transient)
        .environment(env)
        .connector(connector.clone())
        .event_sink(sink);
    if let Some(stages) = options.stages {
        builder = builder.stages(stages);
    }

    Harness {
        endpoint: builder.build().expect("endpoint builds"),
        connector,
        events,
    }
}

/// Poll until `cond` holds; fails the test after ~5s of (virtual) time
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub fn uncategorized(msg: &str) -> Outcome {
    Outcome::Fail(EndpointError::Uncategorized(msg.to_string()))
}
