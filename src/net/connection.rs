//! Per-connection identity and attributes.
//!
//! # Responsibilities
//! - Generate unique connection IDs for logging
//! - Describe the remote peer of a connection
//! - Carry attributes that application code and handlers share on one
//!   connection (attached parent context, current server span)

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::trace::SpanContext;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Transport-level address of the remote end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    /// A resolved IP endpoint, optionally with the name it was resolved from.
    Inet {
        addr: SocketAddr,
        hostname: Option<String>,
    },
    /// A name that was never resolved to an IP.
    Unresolved { hostname: String, port: u16 },
}

impl PeerAddress {
    pub fn inet(addr: SocketAddr) -> Self {
        PeerAddress::Inet {
            addr,
            hostname: None,
        }
    }

    pub fn resolved(hostname: impl Into<String>, addr: SocketAddr) -> Self {
        PeerAddress::Inet {
            addr,
            hostname: Some(hostname.into()),
        }
    }

    pub fn unresolved(hostname: impl Into<String>, port: u16) -> Self {
        PeerAddress::Unresolved {
            hostname: hostname.into(),
            port,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            PeerAddress::Inet { addr, .. } => addr.port(),
            PeerAddress::Unresolved { port, .. } => *port,
        }
    }

    /// The peer's host name, when one is known.
    pub fn hostname(&self) -> Option<&str> {
        match self {
            PeerAddress::Inet { hostname, .. } => hostname.as_deref(),
            PeerAddress::Unresolved { hostname, .. } => Some(hostname),
        }
    }
}

/// Attributes of one connection, handed to every handler callback.
#[derive(Debug, Clone)]
pub struct ChannelContext {
    id: ConnectionId,
    peer: Option<PeerAddress>,
    /// Parent for the next initiator span, attached by application code
    /// before the request is written.
    pub client_parent: Option<SpanContext>,
    /// Context of the responder span of the open exchange. Cleared when the
    /// exchange is finalized or discarded.
    pub server_span: Option<SpanContext>,
}

impl ChannelContext {
    pub fn new(peer: Option<PeerAddress>) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            client_parent: None,
            server_span: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<&PeerAddress> {
        self.peer.as_ref()
    }

    pub fn set_peer(&mut self, peer: Option<PeerAddress>) {
        self.peer = peer;
    }

    /// Attach (or clear) the parent context used for outgoing requests.
    pub fn attach_parent(&mut self, parent: Option<SpanContext>) {
        self.client_parent = parent;
    }
}

impl Default for ChannelContext {
    fn default() -> Self {
        Self::new(None)
    }
}
