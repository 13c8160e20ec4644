//! Database client endpoint layer
//!
//! An endpoint is one connection to one server node, scoped to one bucket.
//! This crate owns its lifecycle: connecting with a bounded attempt,
//! reconnecting with backoff, gating requests on the connection state and
//! recovering when the channel drops. Wire codecs and socket handling sit
//! behind the [`transport`] traits.

pub mod endpoint;
pub mod message;
pub mod transport;

pub use endpoint::{
    Credential, Endpoint, EndpointBuilder, EndpointConfig, EndpointError, Environment,
    LifecycleState, Notification,
};
pub use message::{EventSink, MessageRequest, Request, ResponseEvent};
