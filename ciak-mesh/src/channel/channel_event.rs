use crate::error::MeshError;
use ciak_core::FramedMessage;
use std::net::SocketAddr;

/// Events a framed channel reports to its owner.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The TCP connection is up. Emitted at most once.
    Connected(SocketAddr),

    /// One decoded line, in arrival order.
    Message(FramedMessage),

    /// A connect failure, or a bad line that was skipped.
    Error(MeshError),

    /// The connection is gone. Emitted at most once, and nothing follows it.
    Closed,
}
