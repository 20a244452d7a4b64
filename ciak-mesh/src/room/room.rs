use crate::config::MeshConfig;
use crate::error::{MeshError, Result};
use crate::media::MediaEngine;
use crate::room::room_command::RoomCommand;
use crate::room::room_event::RoomEvent;
use crate::room::room_state::{RoomState, SessionEntry};
use crate::room::segment::SegmentLog;
use crate::session::{NegotiationState, PeerSession, SessionEvent, SessionOptions};
use ciak_core::{Director, FramedMessage, PeerDescriptor, PeerId, PortPlan};
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Room coordinator actor. Owns every peer session of this device, relays
/// `addUser` while acting as admin and arbitrates the director role.
pub struct Room {
    config: MeshConfig,
    plan: PortPlan,
    engine: Arc<dyn MediaEngine>,
    state: RoomState,
    segments: SegmentLog,
    initial_peers: Vec<PeerDescriptor>,
    command_rx: mpsc::Receiver<RoomCommand>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    events: mpsc::Sender<RoomEvent>,
}

impl Room {
    pub fn new(
        config: MeshConfig,
        engine: Arc<dyn MediaEngine>,
        initial_peers: Vec<PeerDescriptor>,
        command_rx: mpsc::Receiver<RoomCommand>,
        events: mpsc::Sender<RoomEvent>,
    ) -> Self {
        let (session_tx, session_rx) = mpsc::unbounded_channel();

        Self {
            plan: config.port_plan(),
            config,
            engine,
            state: RoomState::new(),
            segments: SegmentLog::new(),
            initial_peers,
            command_rx,
            session_rx,
            session_tx,
            events,
        }
    }

    pub async fn run(mut self) {
        info!("Room event loop started");

        if let Err(e) = self.engine.start().await {
            error!(error = %e, "Media engine failed to start");
            self.emit_final(RoomEvent::Fatal(format!("{:#}", e))).await;
            self.dispose().await;
            self.emit_closed().await;
            return;
        }

        let initial = std::mem::take(&mut self.initial_peers);
        self.add_peers(initial);

        while !self.state.closed {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down room.");
                            self.dispose().await;
                        }
                    }
                }

                Some(evt) = self.session_rx.recv() => {
                    self.handle_session_event(evt);
                }
            }
        }

        // After the dispose reply: the caller may not be reading events.
        self.emit_closed().await;
        info!("Room event loop finished");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::AddPeers(peers) => self.add_peers(peers),

            RoomCommand::TakeDirector { reply } => {
                let result = self.take_director();
                let _ = reply.send(result);
            }

            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }

            RoomCommand::Dispose { reply } => {
                self.dispose().await;
                let _ = reply.send(());
            }
        }
    }

    fn add_peers(&mut self, peers: Vec<PeerDescriptor>) {
        for descriptor in peers {
            self.add_peer(descriptor);
        }
    }

    fn add_peer(&mut self, descriptor: PeerDescriptor) {
        if self.state.holds(&descriptor) {
            debug!(peer = %descriptor, "Already holding a session for this address");
            return;
        }

        let limit = usize::from(self.config.max_peers.saturating_sub(1));
        if self.state.sessions.len() >= limit {
            warn!(peer = %descriptor, max_peers = self.config.max_peers, "Room full, ignoring peer");
            return;
        }

        let peer_id = PeerId::new();

        // Joiners leave the director unknown until a sharing peer sends changeUser.
        if self.state.sessions.is_empty()
            && self.state.director == Director::Unknown
            && descriptor.is_initiator
        {
            info!("Acting as room admin and starting director");
            self.state.sharing = true;
            self.set_director(Director::Local);
        }

        let admin = self.state.is_admin() || (self.state.sessions.is_empty() && descriptor.is_initiator);
        let slot = if admin {
            let slot = self.state.next_slot;
            self.state.next_slot += 1;
            Some(slot)
        } else {
            None
        };

        let share_video = self.state.sharing;
        let handle = PeerSession::spawn(
            peer_id,
            descriptor,
            SessionOptions::from_config(&self.config, share_video),
            self.engine.clone(),
            self.session_tx.clone(),
        );

        info!(peer_id = %peer_id, peer = %descriptor, slot = ?slot, "Session opened");
        self.state.sessions.push(SessionEntry {
            handle,
            state: NegotiationState::Connecting,
            is_sharing_video: share_video,
            remote_addr: None,
            slot,
        });

        self.emit(RoomEvent::SessionOpened {
            peer_id,
            descriptor,
        });
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected(peer_id, addr) => self.on_connected(peer_id, addr),

            SessionEvent::StateChanged(peer_id, state) => {
                let Some(entry) = self.state.entry_mut(&peer_id) else {
                    return;
                };
                entry.state = state;
                self.emit(RoomEvent::SessionStateChanged { peer_id, state });
                self.check_mesh_ready();
            }

            SessionEvent::Message(peer_id, message) => self.on_message(peer_id, message),

            SessionEvent::VideoSettled(peer_id) => {
                if self.state.pending_handoff.remove(&peer_id) && self.state.pending_handoff.is_empty() {
                    info!("Director handoff complete");
                }
            }

            SessionEvent::RemoteTrack(peer_id, kind) => {
                self.emit(RoomEvent::RemoteTrack { peer_id, kind });
            }

            SessionEvent::Error(peer_id, e) => {
                warn!(peer_id = %peer_id, error = %e, "Session reported an error");
            }

            SessionEvent::Closed(peer_id, error) => {
                let Some(entry) = self.state.remove(&peer_id) else {
                    return;
                };
                warn!(peer_id = %peer_id, peer = %entry.descriptor(), "Peer lost");
                self.emit(RoomEvent::PeerLost {
                    peer_id,
                    descriptor: *entry.descriptor(),
                    error,
                });
                self.check_mesh_ready();
            }
        }
    }

    fn on_connected(&mut self, peer_id: PeerId, addr: SocketAddr) {
        let Some(entry) = self.state.entry_mut(&peer_id) else {
            return;
        };
        entry.remote_addr = Some(addr);

        if self.state.is_admin() {
            self.relay(peer_id);
        }
    }

    /// Introduce a freshly connected joiner to every other connected joiner.
    /// The earlier slot of each pair listens, the later one dials.
    fn relay(&self, peer_id: PeerId) {
        let Some(joined) = self.state.entry(&peer_id) else {
            return;
        };
        let (Some(joined_slot), Some(joined_addr)) = (joined.slot, joined.remote_addr) else {
            return;
        };

        for other in &self.state.sessions {
            if other.peer_id() == peer_id {
                continue;
            }
            let (Some(other_slot), Some(other_addr)) = (other.slot, other.remote_addr) else {
                continue;
            };
            let Some(port) = self.plan.mesh_port(joined_slot, other_slot) else {
                warn!(a = joined_slot, b = other_slot, "No mesh port for slot pair");
                continue;
            };

            let (earlier, earlier_addr, later, later_addr) = if other_slot < joined_slot {
                (other, other_addr, joined, joined_addr)
            } else {
                (joined, joined_addr, other, other_addr)
            };

            info!(
                listener = %earlier_addr.ip(),
                dialer = %later_addr.ip(),
                port,
                "Relaying addUser"
            );
            let to_earlier = PeerDescriptor::new(later_addr.ip(), port, true);
            let to_later = PeerDescriptor::new(earlier_addr.ip(), port, false);

            for (entry, descriptor) in [(earlier, to_earlier), (later, to_later)] {
                if let Err(e) = entry.handle.send(FramedMessage::AddUser(descriptor)) {
                    warn!(peer_id = %entry.peer_id(), error = %e, "Failed to relay addUser");
                }
            }
        }
    }

    fn on_message(&mut self, peer_id: PeerId, message: FramedMessage) {
        match message {
            FramedMessage::AddUser(descriptor) => {
                debug!(from = %peer_id, peer = %descriptor, "Received addUser");
                self.add_peer(descriptor);
            }
            FramedMessage::ChangeUser => self.on_remote_director(peer_id),
            FramedMessage::CloseRoom => {
                info!(peer_id = %peer_id, "Peer is leaving the room");
                self.emit(RoomEvent::CloseRequested(peer_id));
            }
            other => {
                warn!(peer_id = %peer_id, action = %other.action(), "Unexpected message for the room");
            }
        }
    }

    fn on_remote_director(&mut self, peer_id: PeerId) {
        if !self.state.pending_handoff.is_empty() {
            warn!(peer_id = %peer_id, "Remote director takes over an unfinished handoff");
            self.state.pending_handoff.clear();
        }

        for entry in &mut self.state.sessions {
            if let Err(e) = entry.handle.stop_video() {
                debug!(peer_id = %entry.peer_id(), error = %e, "Failed to stop video");
            }
            entry.is_sharing_video = false;
        }

        self.state.sharing = false;
        self.set_director(Director::Remote(peer_id));
    }

    fn take_director(&mut self) -> Result<()> {
        if self.state.closed {
            return Err(MeshError::RoomClosed);
        }
        if !self.state.pending_handoff.is_empty() {
            return Err(MeshError::HandoffInProgress);
        }
        if self.state.sharing {
            return Err(MeshError::AlreadyDirector);
        }

        self.state.sharing = true;

        for entry in &mut self.state.sessions {
            if let Err(e) = entry.handle.start_video() {
                warn!(peer_id = %entry.peer_id(), error = %e, "Failed to start video");
                continue;
            }
            entry.is_sharing_video = true;
            if entry.state == NegotiationState::Established {
                self.state.pending_handoff.insert(entry.peer_id());
            }
        }

        info!(renegotiating = self.state.pending_handoff.len(), "Took the director role");
        self.set_director(Director::Local);
        Ok(())
    }

    fn set_director(&mut self, director: Director) {
        if self.state.director == director {
            return;
        }

        self.state.director = director;
        info!(director = %director, "Director changed");
        self.emit(RoomEvent::DirectorChanged(director));

        let segment = self.segments.roll(director);
        debug!(index = segment.index, local = segment.is_local(), "Segment started");
        self.emit(RoomEvent::SegmentStarted(segment));
    }

    fn check_mesh_ready(&mut self) {
        if let Some(peers) = self.state.take_mesh_ready() {
            info!(peers, "Mesh ready");
            self.emit(RoomEvent::MeshReady { peers });
        }
    }

    async fn dispose(&mut self) {
        if self.state.closed {
            return;
        }
        self.state.closed = true;
        info!(sessions = self.state.sessions.len(), "Disposing room");

        for entry in &self.state.sessions {
            if entry.remote_addr.is_some() {
                let _ = entry.handle.send(FramedMessage::CloseRoom);
            }
        }

        let sessions = std::mem::take(&mut self.state.sessions);
        join_all(sessions.iter().map(|entry| entry.handle.dispose())).await;

        self.state.pending_handoff.clear();
        self.state.sharing = false;
        self.engine.shutdown().await;
    }

    async fn emit_closed(&mut self) {
        let segments = self.segments.finish();
        info!(segments = segments.len(), "Room closed");
        self.emit_final(RoomEvent::Closed { segments }).await;
    }

    /// Terminal events wait for room in the consumer's buffer.
    async fn emit_final(&self, event: RoomEvent) {
        let _ = self.events.send(event).await;
    }

    fn emit(&self, event: RoomEvent) {
        if let Err(e) = self.events.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    warn!(event = ?event, "Room event dropped, consumer is lagging");
                }
                mpsc::error::TrySendError::Closed(_) => {}
            }
        }
    }
}
