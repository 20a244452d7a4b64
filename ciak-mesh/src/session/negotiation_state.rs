use serde::Serialize;
use std::fmt;

/// Offer/answer progress of one peer session. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NegotiationState {
    Idle,
    Connecting,
    AwaitingLocalDescription,
    AwaitingRemoteDescription,
    Established,
    Closed,
}

impl NegotiationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Closed)
    }

    pub fn can_advance_to(&self, next: NegotiationState) -> bool {
        !self.is_terminal() && next > *self
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::Connecting => "connecting",
            NegotiationState::AwaitingLocalDescription => "awaiting-local-description",
            NegotiationState::AwaitingRemoteDescription => "awaiting-remote-description",
            NegotiationState::Established => "established",
            NegotiationState::Closed => "closed",
        };
        f.write_str(name)
    }
}
