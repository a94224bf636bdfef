//! Peer address tagging.

use crate::http::tags;
use crate::net::connection::PeerAddress;
use crate::observability::span::Span;

/// Renders a connection's peer as span tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerAddressResolver;

impl PeerAddressResolver {
    /// `ip:port` for resolved peers, `hostname:port` otherwise.
    pub fn address(peer: &PeerAddress) -> String {
        match peer {
            PeerAddress::Inet { addr, .. } => addr.to_string(),
            PeerAddress::Unresolved { hostname, port } => format!("{hostname}:{port}"),
        }
    }

    /// Tag `peer.address` and `peer.port`. No peer, no tags.
    pub fn apply(span: &mut Span, peer: Option<&PeerAddress>) {
        let Some(peer) = peer else {
            return;
        };
        span.set_tag(tags::PEER_PORT, i64::from(peer.port()));
        span.set_tag(tags::PEER_ADDRESS, Self::address(peer));
    }

    /// Tag `peer.hostname` and `peer.port`, falling back to the address text
    /// when no host name is known.
    pub fn apply_hostname(span: &mut Span, peer: Option<&PeerAddress>) {
        let Some(peer) = peer else {
            return;
        };
        span.set_tag(tags::PEER_PORT, i64::from(peer.port()));
        let hostname = match peer.hostname() {
            Some(name) => name.to_string(),
            None => match peer {
                PeerAddress::Inet { addr, .. } => addr.ip().to_string(),
                PeerAddress::Unresolved { hostname, .. } => hostname.clone(),
            },
        };
        span.set_tag(tags::PEER_HOSTNAME, hostname);
    }
}
