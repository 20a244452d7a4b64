use crate::session::{NegotiationState, PeerSessionHandle};
use ciak_core::{Director, PeerDescriptor, PeerId};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::net::SocketAddr;

pub(crate) struct SessionEntry {
    pub handle: PeerSessionHandle,
    pub state: NegotiationState,
    pub is_sharing_video: bool,
    /// Address the channel actually connected to or accepted from.
    pub remote_addr: Option<SocketAddr>,
    /// Joiner slot on the admin, used to pick mesh ports.
    pub slot: Option<u16>,
}

impl SessionEntry {
    pub fn peer_id(&self) -> PeerId {
        self.handle.peer_id()
    }

    pub fn descriptor(&self) -> &PeerDescriptor {
        self.handle.descriptor()
    }
}

/// Everything the room actor owns. Only touched from the actor task.
#[derive(Default)]
pub(crate) struct RoomState {
    pub sessions: Vec<SessionEntry>,
    pub sharing: bool,
    pub closed: bool,
    pub director: Director,
    pub pending_handoff: HashSet<PeerId>,
    pub next_slot: u16,
    last_ready: Option<BTreeSet<PeerId>>,
}

impl RoomState {
    pub fn new() -> Self {
        Self {
            next_slot: 1,
            ..Default::default()
        }
    }

    /// The device whose first session listens is the room admin.
    pub fn is_admin(&self) -> bool {
        self.sessions
            .first()
            .is_some_and(|entry| entry.descriptor().is_initiator)
    }

    pub fn entry(&self, peer_id: &PeerId) -> Option<&SessionEntry> {
        self.sessions.iter().find(|e| e.peer_id() == *peer_id)
    }

    pub fn entry_mut(&mut self, peer_id: &PeerId) -> Option<&mut SessionEntry> {
        self.sessions.iter_mut().find(|e| e.peer_id() == *peer_id)
    }

    pub fn holds(&self, descriptor: &PeerDescriptor) -> bool {
        self.sessions
            .iter()
            .any(|e| e.descriptor().addr() == descriptor.addr())
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> Option<SessionEntry> {
        let index = self.sessions.iter().position(|e| e.peer_id() == *peer_id)?;
        self.pending_handoff.remove(peer_id);
        Some(self.sessions.remove(index))
    }

    /// Returns the peer count when every live session is established and
    /// that set differs from the last time this returned `Some`.
    pub fn take_mesh_ready(&mut self) -> Option<usize> {
        if self.sessions.is_empty()
            || self
                .sessions
                .iter()
                .any(|e| e.state != NegotiationState::Established)
        {
            return None;
        }

        let ready: BTreeSet<PeerId> = self.sessions.iter().map(|e| e.peer_id()).collect();
        if self.last_ready.as_ref() == Some(&ready) {
            return None;
        }

        let count = ready.len();
        self.last_ready = Some(ready);
        Some(count)
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            sessions: self
                .sessions
                .iter()
                .map(|e| SessionSnapshot {
                    peer_id: e.peer_id(),
                    descriptor: *e.descriptor(),
                    state: e.state,
                    is_sharing_video: e.is_sharing_video,
                })
                .collect(),
            sharing: self.sharing,
            is_admin: self.is_admin(),
            closed: self.closed,
            director: self.director,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub peer_id: PeerId,
    pub descriptor: PeerDescriptor,
    pub state: NegotiationState,
    pub is_sharing_video: bool,
}

/// Read-only copy of the room, in session insertion order.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub sessions: Vec<SessionSnapshot>,
    pub sharing: bool,
    pub is_admin: bool,
    pub closed: bool,
    pub director: Director,
}

impl RoomSnapshot {
    pub fn established(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.state == NegotiationState::Established)
            .count()
    }

    pub fn sharing_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_sharing_video).count()
    }
}
