use ciak_core::CodecError;
use std::io;
use std::net::SocketAddr;

pub type Result<T> = std::result::Result<T, MeshError>;

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("No peer connected on port {port} within {timeout_ms} ms")]
    AcceptTimeout { port: u16, timeout_ms: u64 },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Not connected")]
    NotConnected,

    #[error("This device is already the director")]
    AlreadyDirector,

    #[error("A director handoff is already in progress")]
    HandoffInProgress,

    #[error("Room closed")]
    RoomClosed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl MeshError {
    pub fn negotiation(err: anyhow::Error) -> Self {
        MeshError::Negotiation(format!("{:#}", err))
    }

    /// Socket-level setup failures, the only ones a dialing session retries.
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            MeshError::Connect { .. } | MeshError::AcceptTimeout { .. }
        )
    }
}

impl From<CodecError> for MeshError {
    fn from(err: CodecError) -> Self {
        MeshError::Protocol(err.to_string())
    }
}
