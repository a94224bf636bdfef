//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Framed HTTP events (message.rs)
//!     → local.rs (in-memory duplex transport, one task per end)
//!     → pipeline.rs (handlers: inbound head→tail, outbound tail→head)
//!     → connection.rs (per-connection id, peer, shared attributes)
//!
//! Connection States:
//!     Created → Active → Inactive
//! ```
//!
//! # Design Decisions
//! - Each connection is driven by exactly one task, so handler state is
//!   never shared and never locked
//! - Write completion is signalled after the peer accepted the event
//! - Inactive is delivered exactly once, including on drop

pub mod connection;
pub mod local;
pub mod message;
pub mod pipeline;
pub mod stats;

pub use connection::{ChannelContext, ConnectionId, PeerAddress};
pub use local::LocalChannel;
pub use message::HttpObject;
pub use pipeline::{ChannelHandler, Pipeline, WritePromise};
pub use stats::{ConnectionStatsFactory, ConnectionStatsHandler};
