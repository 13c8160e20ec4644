//! Requests flowing down to the wire and events flowing up to the sink

pub mod dcp;

pub use dcp::{ConnectionType, DcpEvent, MutationMessage, RemoveMessage};

use crate::endpoint::{Completer, EndpointError, Notification};

/// Outbound request accepted by [`crate::Endpoint::send`]
#[derive(Debug)]
pub enum Request {
    /// Flush previously written messages in one go
    Flush,
    Message(MessageRequest),
}

/// An encoded protocol message plus its response handle
#[derive(Debug)]
pub struct MessageRequest {
    /// Frame produced by the upper codec layer
    pub payload: Vec<u8>,
    response: Completer<Vec<u8>>,
}

impl MessageRequest {
    /// Build a request and the notification its caller awaits
    pub fn new(payload: Vec<u8>) -> (Self, Notification<Vec<u8>>) {
        let (response, notification) = Notification::pending();
        (Self { payload, response }, notification)
    }

    /// Resolve the caller's notification (used by codecs and on rejection)
    pub fn respond(self, result: Result<Vec<u8>, EndpointError>) {
        self.response.complete(result);
    }

    pub fn fail(self, err: EndpointError) {
        self.response.fail(err);
    }
}

/// Events published to the upper layers
#[derive(Debug)]
pub enum ResponseEvent {
    /// Topology may be stale, refetch the cluster config
    ConfigReload,
    /// Request that could not be written because the channel was not writable
    Redirect(MessageRequest),
    /// Change stream record decoded by the DCP codec
    Dcp(DcpEvent),
}

impl ResponseEvent {
    pub fn is_config_reload(&self) -> bool {
        matches!(self, Self::ConfigReload)
    }
}

/// Why the sink refused an event; the event is handed back
#[derive(Debug)]
pub enum SinkError {
    Full(ResponseEvent),
    Closed(ResponseEvent),
}

impl SinkError {
    pub fn into_event(self) -> ResponseEvent {
        match self {
            Self::Full(event) | Self::Closed(event) => event,
        }
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => write!(f, "event sink is full"),
            Self::Closed(_) => write!(f, "event sink is closed"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Bounded, non-blocking publish target
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ResponseEvent) -> Result<(), SinkError>;
}

impl EventSink for tokio::sync::mpsc::Sender<ResponseEvent> {
    fn publish(&self, event: ResponseEvent) -> Result<(), SinkError> {
        use tokio::sync::mpsc::error::TrySendError;

        self.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => SinkError::Full(event),
            TrySendError::Closed(event) => SinkError::Closed(event),
        })
    }
}

impl EventSink for crossbeam::channel::Sender<ResponseEvent> {
    fn publish(&self, event: ResponseEvent) -> Result<(), SinkError> {
        use crossbeam::channel::TrySendError;

        self.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => SinkError::Full(event),
            TrySendError::Disconnected(event) => SinkError::Closed(event),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_sink_full_returns_event() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        tx.publish(ResponseEvent::ConfigReload).unwrap();

        let err = tx.publish(ResponseEvent::ConfigReload).unwrap_err();
        assert!(matches!(err, SinkError::Full(_)));
        assert!(err.into_event().is_config_reload());

        assert!(rx.recv().await.unwrap().is_config_reload());
    }

    #[test]
    fn test_crossbeam_sink_closed() {
        let (tx, rx) = crossbeam::channel::bounded(4);
        drop(rx);
        let err = tx.publish(ResponseEvent::ConfigReload).unwrap_err();
        assert!(matches!(err, SinkError::Closed(_)));
    }

    #[tokio::test]
    async fn test_message_request_responds_once() {
        let (req, notification) = MessageRequest::new(vec![0x80, 0x01]);
        assert_eq!(req.payload, vec![0x80, 0x01]);
        req.respond(Ok(vec![0x81]));
        assert_eq!(notification.await, Ok(vec![0x81]));
    }
}
