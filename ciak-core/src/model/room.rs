use crate::model::peer::PeerId;
use std::fmt;

/// Who is currently broadcasting video to the room, as seen from this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Director {
    #[default]
    Unknown,
    Local,
    Remote(PeerId),
}

impl Director {
    pub fn is_local(&self) -> bool {
        matches!(self, Director::Local)
    }
}

impl fmt::Display for Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Director::Unknown => write!(f, "unknown"),
            Director::Local => write!(f, "local"),
            Director::Remote(peer_id) => write!(f, "peer {}", peer_id),
        }
    }
}
