//! Transport seams
//!
//! The endpoint never opens sockets itself. It hands [`ConnectOptions`] to a
//! [`TransportConnector`] and gets back a [`Channel`] or a classified
//! [`EndpointError`]. Connector implementations must report:
//! - refused sockets as `ConnectRefused`
//! - socket connect timeouts as `ConnectTimeout`
//! - TLS failures (from the [`TlsNegotiator`]) as `TlsHandshake`
//! - credential rejection during channel setup as `Authentication`
//! - a channel closed during setup as `ChannelClosed`

pub mod pipeline;

pub use pipeline::{LoggingStage, Pipeline, PipelineCustomizer, Stage};

use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::endpoint::EndpointError;
use crate::message::MessageRequest;

/// Host and port of the remote node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    pub host: String,
    pub port: u16,
}

impl EndpointAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Byte stream a TLS negotiator can wrap
pub trait IoStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> IoStream for T {}

/// Wraps a freshly opened stream with a TLS handshake
#[async_trait]
pub trait TlsNegotiator: Send + Sync {
    async fn handshake(
        &self,
        address: &EndpointAddress,
        stream: Box<dyn IoStream>,
    ) -> Result<Box<dyn IoStream>, EndpointError>;
}

/// Per-attempt options handed to the connector
#[derive(Clone)]
pub struct ConnectOptions {
    pub address: EndpointAddress,
    pub connect_timeout: Duration,
    pub tcp_nodelay: bool,
    pub buffer_pooling: bool,
    /// Present when TLS is enabled; runs before any pipeline stage
    pub tls: Option<Arc<dyn TlsNegotiator>>,
    pub pipeline: Pipeline,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("address", &self.address)
            .field("connect_timeout", &self.connect_timeout)
            .field("tcp_nodelay", &self.tcp_nodelay)
            .field("buffer_pooling", &self.buffer_pooling)
            .field("tls", &self.tls.is_some())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

/// Opens channels to a remote address
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Channel>, EndpointError>;
}

/// A live connection handle
///
/// Implementations deliver callbacks for one channel in order. `write`
/// must not wait for the bytes to reach the socket.
#[async_trait]
pub trait Channel: Send + Sync {
    fn remote_addr(&self) -> Option<SocketAddr>;

    fn is_active(&self) -> bool;

    /// False while the outbound buffer is above its high-water mark
    fn is_writable(&self) -> bool;

    /// Queue a request without a per-write acknowledgement
    fn write(&self, request: MessageRequest);

    fn flush(&self);

    /// Close the channel; resolves once the close completed or failed
    async fn close(&self) -> Result<(), EndpointError>;

    /// Resolves when the channel becomes inactive for any reason
    async fn closed(&self);
}
