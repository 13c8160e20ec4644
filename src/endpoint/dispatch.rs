//! Outbound request gate

use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use super::{Endpoint, EndpointError, LifecycleState, NOT_CONNECTED};
use crate::message::{MessageRequest, Request, ResponseEvent, SinkError};

impl Endpoint {
    /// Hand a request to the channel, or route it elsewhere.
    ///
    /// - Flush: flushes the channel if anything was written since the last
    ///   flush, otherwise a no-op.
    /// - Message while CONNECTED: written if the channel is active and
    ///   writable, otherwise redirected to the event sink so it can be
    ///   re-dispatched to another endpoint.
    /// - Message in any other state: failed with [`NOT_CONNECTED`]. The
    ///   failure is delivered from the I/O pool, never inline.
    pub fn send(&self, request: Request) {
        match request {
            Request::Flush => self.flush_if_written(),
            Request::Message(msg) => self.dispatch(msg),
        }
    }

    /// Dropped unless CONNECTED with pending writes on an active channel
    fn flush_if_written(&self) {
        if self.state() != LifecycleState::Connected || !self.has_written.load(Ordering::SeqCst) {
            return;
        }
        if let Some(channel) = self.current_channel().filter(|c| c.is_active()) {
            channel.flush();
            self.has_written.store(false, Ordering::SeqCst);
        }
    }

    fn dispatch(&self, msg: MessageRequest) {
        if self.state() != LifecycleState::Connected {
            self.metrics.record_not_connected();
            self.env.io_pool().spawn(async move {
                msg.fail(NOT_CONNECTED);
            });
            return;
        }

        match self.current_channel() {
            Some(channel) if channel.is_active() && channel.is_writable() => {
                channel.write(msg);
                self.has_written.store(true, Ordering::SeqCst);
            }
            _ => self.redirect(msg),
        }
    }

    fn redirect(&self, msg: MessageRequest) {
        self.metrics.record_redirect();
        debug!(ident = %self.log_ident(), "endpoint_request_redirected");

        if let Err(e) = self.sink.publish(ResponseEvent::Redirect(msg)) {
            let full = matches!(e, SinkError::Full(_));
            warn!(
                ident = %self.log_ident(),
                error = %e,
                "endpoint_redirect_rejected"
            );
            if let ResponseEvent::Redirect(msg) = e.into_event() {
                msg.fail(if full {
                    EndpointError::SinkFull
                } else {
                    EndpointError::Uncategorized("event sink is closed".to_string())
                });
            }
        }
    }
}
