//! Endpoint error taxonomy
//!
//! Connect failures are classified into a small set of kinds so the
//! orchestrator can decide between failing the caller and retrying.

use std::io;

/// Shared not-connected error handed to every request rejected while the
/// endpoint is down. Unit variant, so reuse costs nothing.
pub const NOT_CONNECTED: EndpointError = EndpointError::NotConnected;

/// Errors surfaced by an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// Server rejected the bucket credentials
    Authentication(String),
    /// TLS handshake failed while wrapping the channel
    TlsHandshake(String),
    /// Channel was closed while connecting
    ChannelClosed(String),
    /// Socket connect timed out (native or safeguard)
    ConnectTimeout(String),
    /// Remote refused the connection
    ConnectRefused(String),
    /// Request sent while the endpoint is not connected
    NotConnected,
    /// Event sink rejected a redirected request
    SinkFull,
    /// Anything the classifier does not recognize
    Uncategorized(String),
}

impl EndpointError {
    /// Kinds that always terminate the caller's pending connect notification.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_)
                | Self::TlsHandshake(_)
                | Self::ChannelClosed(_)
                | Self::ConnectTimeout(_)
                | Self::ConnectRefused(_)
        )
    }

    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::TlsHandshake(_) => "tls_handshake",
            Self::ChannelClosed(_) => "channel_closed",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::ConnectRefused(_) => "connect_refused",
            Self::NotConnected => "not_connected",
            Self::SinkFull => "sink_full",
            Self::Uncategorized(_) => "uncategorized",
        }
    }

    /// Synthesized when the connector never reports back within the safeguard window.
    pub(crate) fn safeguard_timeout() -> Self {
        Self::ConnectTimeout("connect callback did not return, hit safeguarding timeout".to_string())
    }
}

impl std::fmt::Display for EndpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication(m) => write!(f, "authentication failure: {}", m),
            Self::TlsHandshake(m) => write!(f, "tls handshake failure: {}", m),
            Self::ChannelClosed(m) => write!(f, "channel closed: {}", m),
            Self::ConnectTimeout(m) => write!(f, "connect timeout: {}", m),
            Self::ConnectRefused(m) => write!(f, "connect refused: {}", m),
            Self::NotConnected => write!(f, "endpoint is not connected"),
            Self::SinkFull => write!(f, "event sink is full"),
            Self::Uncategorized(m) => write!(f, "connect failure: {}", m),
        }
    }
}

impl std::error::Error for EndpointError {}

impl From<io::Error> for EndpointError {
    fn from(err: io::Error) -> Self {
        let msg = err.to_string();
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectRefused(msg),
            io::ErrorKind::TimedOut => Self::ConnectTimeout(msg),
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => Self::ChannelClosed(msg),
            _ => Self::Uncategorized(msg),
        }
    }
}
