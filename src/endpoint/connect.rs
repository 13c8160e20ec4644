//! Connect orchestration
//!
//! One connect chain runs per DISCONNECTED -> CONNECTING edge. Each attempt
//! is bounded by the safeguard timeout, re-checks the lifecycle when it
//! resolves, and either installs the channel, fails the caller, or schedules
//! the next attempt through the reconnect delay.

use std::sync::{atomic::Ordering, Arc};

use tracing::{debug, info, warn, Level};

use super::{same_channel, Completer, Endpoint, EndpointError, LifecycleState, Notification};
use crate::transport::{Channel, ConnectOptions, LoggingStage, Pipeline};

impl Endpoint {
    /// Connect to the remote node.
    ///
    /// No-op when the endpoint is not DISCONNECTED or has been explicitly
    /// disconnected; the notification then carries the current state. The
    /// notification settles exactly once, after the first attempt.
    pub fn connect(self: &Arc<Self>) -> Notification<LifecycleState> {
        self.connect_with(true)
    }

    pub(crate) fn connect_with(self: &Arc<Self>, bootstrap: bool) -> Notification<LifecycleState> {
        if self.disconnected.load(Ordering::SeqCst) {
            debug!(
                address = %self.identity.address,
                bucket = %self.identity.bucket,
                "endpoint_connect_ignored_after_disconnect"
            );
            return Notification::ready(Ok(self.state()));
        }

        if !self.transition_from(LifecycleState::Disconnected, LifecycleState::Connecting) {
            let state = self.state();
            if bootstrap && state == LifecycleState::Connecting {
                warn!(
                    address = %self.identity.address,
                    bucket = %self.identity.bucket,
                    "endpoint_overlapping_bootstrap_connect"
                );
            }
            return Notification::ready(Ok(state));
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.has_written.store(false, Ordering::SeqCst);

        let (completer, notification) = Notification::pending();
        let endpoint = Arc::clone(self);
        self.env.io_pool().spawn(async move {
            endpoint.attempt(Some(completer), bootstrap, epoch).await;
        });
        notification
    }

    /// Options for a single attempt; the pipeline is rebuilt every time
    fn connect_options(&self) -> ConnectOptions {
        let config = self.env.config();

        let mut pipeline = Pipeline::new();
        if tracing::enabled!(Level::TRACE) {
            pipeline.add_last(Arc::new(LoggingStage));
        }
        self.stages.custom_stages(&mut pipeline);

        ConnectOptions {
            address: self.identity.address.clone(),
            connect_timeout: config.socket_connect_timeout(),
            tcp_nodelay: config.tcp_nodelay_enabled,
            buffer_pooling: config.buffer_pooling_enabled,
            tls: if config.tls_enabled {
                self.env.tls().cloned()
            } else {
                None
            },
            pipeline,
        }
    }

    /// One connect attempt of the current chain. A failed bootstrap attempt
    /// starts its background loop through `schedule_retry` (backoff plus a
    /// config reload), not an immediate reconnect.
    async fn attempt(
        self: Arc<Self>,
        mut completer: Option<Completer<LifecycleState>>,
        bootstrap: bool,
        epoch: u64,
    ) {
        self.metrics.record_connect_attempt();

        let options = self.connect_options();
        let safeguard = self.env.config().connect_safeguard_timeout();
        let outcome = match tokio::time::timeout(safeguard, self.connector.connect(&options)).await
        {
            Ok(result) => result,
            Err(_) => Err(EndpointError::safeguard_timeout()),
        };

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(
                address = %self.identity.address,
                bucket = %self.identity.bucket,
                "endpoint_connect_superseded"
            );
            self.metrics.record_discarded_connect();
            if let Ok(channel) = outcome {
                self.close_detached(channel);
            }
            if let Some(completer) = completer {
                completer.succeed(self.state());
            }
            return;
        }

        if self.state().is_down() || self.disconnected.load(Ordering::SeqCst) {
            self.discard_attempt(outcome.ok(), completer);
            return;
        }

        match outcome {
            Ok(channel) => {
                *self.channel.write() = Some(Arc::clone(&channel));

                // Lose the race against disconnect() and nothing gets installed
                if !self.transition_from(LifecycleState::Connecting, LifecycleState::Connected) {
                    self.discard_attempt(Some(channel), completer);
                    return;
                }

                self.metrics.record_connect_success();
                info!(
                    address = %self.identity.address,
                    bucket = %self.identity.bucket,
                    remote = ?channel.remote_addr(),
                    "endpoint_connected"
                );
                self.watch_channel(channel);

                if let Some(completer) = completer {
                    completer.succeed(LifecycleState::Connected);
                }
            }
            Err(err) => {
                self.metrics.record_connect_failure();

                if err.is_terminal() || self.identity.transient {
                    warn!(
                        address = %self.identity.address,
                        bucket = %self.identity.bucket,
                        kind = err.kind(),
                        error = %err,
                        "endpoint_connect_failed"
                    );
                    self.transition(LifecycleState::Disconnected);
                    if let Some(completer) = completer.take() {
                        completer.fail(err.clone());
                    }
                } else {
                    debug!(
                        address = %self.identity.address,
                        bucket = %self.identity.bucket,
                        error = %err,
                        "endpoint_connect_failed_unclassified"
                    );
                    if bootstrap {
                        if let Some(completer) = completer.take() {
                            completer.fail(err.clone());
                        }
                    }
                }

                if self.identity.transient {
                    debug!(
                        address = %self.identity.address,
                        bucket = %self.identity.bucket,
                        "endpoint_transient_not_retrying"
                    );
                } else if self.disconnected.load(Ordering::SeqCst) {
                    debug!(
                        address = %self.identity.address,
                        bucket = %self.identity.bucket,
                        "endpoint_retry_skipped_disconnected"
                    );
                } else {
                    self.schedule_retry(epoch, &err);
                }

                if let Some(completer) = completer {
                    completer.succeed(self.state());
                }
            }
        }
    }

    /// The attempt resolved after the endpoint went down: undo everything
    fn discard_attempt(
        &self,
        channel: Option<Arc<dyn Channel>>,
        completer: Option<Completer<LifecycleState>>,
    ) {
        debug!(
            ident = %self.log_ident(),
            "endpoint_connect_discarded"
        );
        self.metrics.record_discarded_connect();

        if let Some(channel) = channel {
            let installed = self
                .channel
                .read()
                .as_ref()
                .map(|c| same_channel(c, &channel))
                .unwrap_or(false);
            if installed {
                self.clear_channel();
            }
            self.close_detached(channel);
        }
        self.transition(LifecycleState::Disconnected);

        if let Some(completer) = completer {
            completer.succeed(LifecycleState::Disconnected);
        }
    }

    /// Wait out the reconnect delay, then run the next attempt of this chain
    fn schedule_retry(self: &Arc<Self>, epoch: u64, cause: &EndpointError) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        let attempt = self.reconnect_attempt.fetch_add(1, Ordering::SeqCst);
        let delay = self.env.reconnect_delay().calculate(attempt);
        self.metrics.record_retry_scheduled();
        warn!(
            address = %self.identity.address,
            bucket = %self.identity.bucket,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %cause,
            "endpoint_retry_scheduled"
        );

        self.signal_config_reload();
        self.transition(LifecycleState::Connecting);

        let endpoint = Arc::clone(self);
        self.env.io_pool().spawn(async move {
            tokio::time::sleep(delay).await;

            if endpoint.epoch.load(Ordering::SeqCst) != epoch {
                debug!(
                    address = %endpoint.identity.address,
                    bucket = %endpoint.identity.bucket,
                    "endpoint_retry_superseded"
                );
                return;
            }

            if endpoint.disconnected.load(Ordering::SeqCst) {
                debug!(
                    address = %endpoint.identity.address,
                    bucket = %endpoint.identity.bucket,
                    "endpoint_retry_abandoned"
                );
                // The retry may have flipped us back to CONNECTING after the
                // disconnect already ran
                let _ = endpoint.disconnect();
                return;
            }

            endpoint.attempt(None, false, epoch).await;
        });
    }

    /// Disconnect for good.
    ///
    /// Sets the sticky disconnected flag, so every pending retry stops and
    /// later connect() calls are no-ops. A CONNECTING endpoint drops straight
    /// to DISCONNECTED; a CONNECTED one goes through DISCONNECTING while the
    /// channel closes.
    pub fn disconnect(self: &Arc<Self>) -> Notification<LifecycleState> {
        self.disconnected.store(true, Ordering::SeqCst);

        loop {
            match self.state() {
                state @ (LifecycleState::Disconnected | LifecycleState::Disconnecting) => {
                    return Notification::ready(Ok(state));
                }
                LifecycleState::Connecting => {
                    if self.transition_from(LifecycleState::Connecting, LifecycleState::Disconnected)
                    {
                        self.clear_channel();
                        return Notification::ready(Ok(LifecycleState::Disconnected));
                    }
                }
                LifecycleState::Connected => {
                    if self
                        .transition_from(LifecycleState::Connected, LifecycleState::Disconnecting)
                    {
                        break;
                    }
                }
            }
        }

        let channel = self.current_channel();
        let (completer, notification) = Notification::pending();
        let endpoint = Arc::clone(self);
        self.env.io_pool().spawn(async move {
            if let Some(channel) = channel {
                match channel.close().await {
                    Ok(()) => debug!(ident = %endpoint.log_ident(), "endpoint_disconnected"),
                    Err(e) => warn!(
                        ident = %endpoint.log_ident(),
                        error = %e,
                        "endpoint_disconnect_failed"
                    ),
                }
            }
            endpoint.transition(LifecycleState::Disconnected);
            endpoint.clear_channel();
            info!(
                address = %endpoint.identity.address,
                bucket = %endpoint.identity.bucket,
                metrics = %endpoint.metrics.summary(),
                "endpoint_shutdown"
            );
            completer.succeed(LifecycleState::Disconnected);
        });
        notification
    }

    fn close_detached(&self, channel: Arc<dyn Channel>) {
        let address = self.identity.address.clone();
        self.env.io_pool().spawn(async move {
            if let Err(e) = channel.close().await {
                debug!(address = %address, error = %e, "endpoint_stale_channel_close_failed");
            }
        });
    }

    /// Notify the endpoint once the installed channel goes inactive
    fn watch_channel(self: &Arc<Self>, channel: Arc<dyn Channel>) {
        let endpoint = Arc::downgrade(self);
        self.env.io_pool().spawn(async move {
            channel.closed().await;

            let Some(endpoint) = endpoint.upgrade() else {
                return;
            };
            let current = endpoint
                .channel
                .read()
                .as_ref()
                .map(|c| same_channel(c, &channel))
                .unwrap_or(false);
            if current {
                endpoint.notify_inactive();
            }
        });
    }
}
