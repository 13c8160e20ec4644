//! Channel loss handling and config reload signalling

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Endpoint, LifecycleState};
use crate::message::ResponseEvent;

impl Endpoint {
    /// The channel became inactive.
    ///
    /// Persistent endpoints ask for a config reload, drop to DISCONNECTED and
    /// start a background reconnect. Transient endpoints ignore this, they are
    /// torn down by their owner.
    pub fn notify_inactive(self: &Arc<Self>) {
        if self.identity.transient {
            return;
        }

        self.metrics.record_inactive();
        let state = self.state();
        info!(
            ident = %self.log_ident(),
            state = %state,
            "endpoint_inactive"
        );

        if !state.is_down() {
            self.signal_config_reload();
        }

        if matches!(state, LifecycleState::Connected | LifecycleState::Connecting) {
            self.transition(LifecycleState::Disconnected);
            self.clear_channel();

            let reconnect = self.connect_with(false);
            let address = self.identity.address.clone();
            self.env.io_pool().spawn(async move {
                if let Err(e) = reconnect.await {
                    warn!(address = %address, error = %e, "endpoint_reconnect_failed");
                }
            });
        }
    }

    /// Tell the upper layers the topology may be stale
    pub fn signal_config_reload(&self) {
        self.metrics.record_config_reload();
        if let Err(e) = self.sink.publish(ResponseEvent::ConfigReload) {
            debug!(
                address = %self.identity.address,
                bucket = %self.identity.bucket,
                error = %e,
                "endpoint_config_reload_dropped"
            );
        }
    }
}
