//! Address exchange that seeds a room with its star topology.
//!
//! The admin accepts joiners on the lobby port. Each joiner sends its own
//! address, the admin answers with the star port it will listen on for
//! that joiner, and both sides end up with a [`PeerDescriptor`] for the
//! same link.

use crate::channel::frame::{read_line, write_line};
use crate::error::{MeshError, Result};
use ciak_core::{Envelope, PeerDescriptor, PortPlan};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

const ADDRESS_ACTION: &str = "address";
const FULL_ACTION: &str = "full";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressPayload {
    partner_ip: IpAddr,
    partner_port: u16,
}

/// Admin side of the address exchange.
pub struct Lobby {
    listener: TcpListener,
    plan: PortPlan,
    next_slot: u16,
    exchange_timeout: Duration,
}

impl Lobby {
    pub async fn bind(port: u16, plan: PortPlan, exchange_timeout: Duration) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| MeshError::Connect { addr, source })?;
        info!(addr = %addr, max_peers = plan.max_peers(), "Lobby listening");

        Ok(Self {
            listener,
            plan,
            next_slot: 1,
            exchange_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn joined(&self) -> u16 {
        self.next_slot - 1
    }

    pub fn is_full(&self) -> bool {
        self.plan.star_port(self.next_slot).is_none()
    }

    /// Wait for the next joiner and assign it a star slot. The returned
    /// descriptor is the admin's end of the link: listen on the star port.
    ///
    /// Joiners that arrive once the room is full are told so and skipped.
    pub async fn accept_joiner(&mut self) -> Result<PeerDescriptor> {
        loop {
            let (mut stream, addr) = self.listener.accept().await?;
            debug!(addr = %addr, "Lobby connection");

            if self.is_full() {
                warn!(addr = %addr, "Lobby full, rejecting joiner");
                let _ = reject(&mut stream).await;
                continue;
            }

            match tokio::time::timeout(self.exchange_timeout, self.exchange(stream, addr)).await {
                Ok(Ok(descriptor)) => return Ok(descriptor),
                Ok(Err(e)) => warn!(addr = %addr, error = %e, "Address exchange failed"),
                Err(_) => warn!(addr = %addr, "Address exchange timed out"),
            }
        }
    }

    async fn exchange(&mut self, stream: TcpStream, addr: SocketAddr) -> Result<PeerDescriptor> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let hello = Envelope::parse(&read_line(&mut reader).await?)?;
        if hello.action != ADDRESS_ACTION {
            return Err(MeshError::Protocol(format!(
                "Expected '{}', got '{}'",
                ADDRESS_ACTION, hello.action
            )));
        }
        let announced: AddressPayload = hello.payload()?;

        let joiner_ip = if announced.partner_ip.is_unspecified() {
            addr.ip()
        } else {
            announced.partner_ip
        };

        let slot = self.next_slot;
        let port = self
            .plan
            .star_port(slot)
            .ok_or_else(|| MeshError::Protocol("No star port left".into()))?;

        let reply = Envelope::new(
            ADDRESS_ACTION,
            &AddressPayload {
                partner_ip: joiner_ip,
                partner_port: port,
            },
        )?;
        write_line(&mut write_half, &reply.to_line()?).await?;

        self.next_slot += 1;
        info!(joiner = %joiner_ip, slot, port, "Joiner admitted");

        Ok(PeerDescriptor::new(joiner_ip, port, true))
    }
}

async fn reject(stream: &mut TcpStream) -> Result<()> {
    let line = Envelope::new(FULL_ACTION, &serde_json::json!({}))?.to_line()?;
    write_line(stream, &line).await
}

/// Joiner side: tell the admin our address and learn which port to dial.
///
/// `my_ip` may be unspecified, in which case the admin uses the address it
/// sees the connection coming from.
pub async fn announce(admin: SocketAddr, my_ip: IpAddr) -> Result<PeerDescriptor> {
    let stream = TcpStream::connect(admin)
        .await
        .map_err(|source| MeshError::Connect {
            addr: admin,
            source,
        })?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let hello = Envelope::new(
        ADDRESS_ACTION,
        &AddressPayload {
            partner_ip: my_ip,
            partner_port: 0,
        },
    )?;
    write_line(&mut write_half, &hello.to_line()?).await?;

    let reply = Envelope::parse(&read_line(&mut reader).await?)?;
    match reply.action.as_str() {
        ADDRESS_ACTION => {
            let assigned: AddressPayload = reply.payload()?;
            info!(admin = %admin.ip(), port = assigned.partner_port, "Lobby assigned star port");
            Ok(PeerDescriptor::new(admin.ip(), assigned.partner_port, false))
        }
        FULL_ACTION => Err(MeshError::Protocol("Room is full".into())),
        other => Err(MeshError::Protocol(format!("Unexpected lobby reply '{}'", other))),
    }
}
