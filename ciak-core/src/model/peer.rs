use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PeerId(pub Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for PeerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One remote endpoint and which side of the pair listens.
///
/// The serialized form doubles as the `addUser` payload, hence the
/// `partnerIp` / `partnerPort` field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerDescriptor {
    #[serde(rename = "partnerIp")]
    pub ip: IpAddr,
    #[serde(rename = "partnerPort")]
    pub port: u16,
    /// `true` when this device binds `port` and waits for the peer to dial.
    pub is_initiator: bool,
}

impl PeerDescriptor {
    pub fn new(ip: IpAddr, port: u16, is_initiator: bool) -> Self {
        Self {
            ip,
            port,
            is_initiator,
        }
    }

    /// Address used for duplicate detection and, on the dialing side, for connecting.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Display for PeerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.is_initiator { "listen" } else { "dial" };
        write!(f, "{} ({})", self.addr(), role)
    }
}

/// Parses `ip:port` (dial) or `ip:port:listen` (bind `port`, wait for `ip`).
impl FromStr for PeerDescriptor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, is_initiator) = match s.strip_suffix(":listen") {
            Some(rest) => (rest, true),
            None => (s.strip_suffix(":dial").unwrap_or(s), false),
        };

        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| format!("invalid peer address '{}'", addr))?;

        Ok(Self::new(addr.ip(), addr.port(), is_initiator))
    }
}
