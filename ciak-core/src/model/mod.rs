mod peer;
mod ports;
mod room;
mod signaling;

pub use peer::{PeerDescriptor, PeerId};
pub use ports::PortPlan;
pub use room::Director;
pub use signaling::{FramedMessage, IceCandidate, SdpType, SessionDescription};
