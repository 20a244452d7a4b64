use crate::channel::{ChannelEvent, FramedChannel};
use crate::config::MeshConfig;
use crate::error::{MeshError, Result};
use crate::media::{MediaEngine, MediaEvent, MediaPeer};
use crate::session::negotiation_state::NegotiationState;
use crate::session::session_command::SessionCommand;
use crate::session::session_event::SessionEvent;
use ciak_core::{FramedMessage, IceCandidate, PeerDescriptor, PeerId, SdpType, SessionDescription};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub accept_timeout: Duration,
    pub connect_retries: u32,
    pub retry_backoff: Duration,
    /// Attach local video as soon as the media peer exists.
    pub share_video: bool,
}

impl SessionOptions {
    pub fn from_config(config: &MeshConfig, share_video: bool) -> Self {
        Self {
            accept_timeout: config.accept_timeout(),
            connect_retries: config.connect_retries,
            retry_backoff: config.retry_backoff(),
            share_video,
        }
    }
}

/// Room-side handle to a running [`PeerSession`] task.
#[derive(Clone)]
pub struct PeerSessionHandle {
    peer_id: PeerId,
    descriptor: PeerDescriptor,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
}

impl PeerSessionHandle {
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn descriptor(&self) -> &PeerDescriptor {
        &self.descriptor
    }

    pub fn send(&self, message: FramedMessage) -> Result<()> {
        self.command(SessionCommand::Send(message))
    }

    pub fn start_video(&self) -> Result<()> {
        self.command(SessionCommand::StartVideo)
    }

    pub fn stop_video(&self) -> Result<()> {
        self.command(SessionCommand::StopVideo)
    }

    /// Close the session and wait until its channel and media peer are released.
    /// Returns immediately if the session already ended.
    pub async fn dispose(&self) {
        let (done, done_rx) = oneshot::channel();
        if self.command(SessionCommand::Dispose { done }).is_ok() {
            let _ = done_rx.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(peer_id: PeerId, descriptor: PeerDescriptor) -> Self {
        let (cmd_tx, _) = mpsc::unbounded_channel();
        Self {
            peer_id,
            descriptor,
            cmd_tx,
        }
    }

    fn command(&self, cmd: SessionCommand) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| MeshError::ChannelClosed)
    }
}

/// Per-peer worker: owns the framed channel and the media peer and drives
/// the offer/answer exchange. Channel events, media events and room
/// commands for one peer are all handled on this single task.
pub struct PeerSession {
    peer_id: PeerId,
    descriptor: PeerDescriptor,
    options: SessionOptions,
    engine: Arc<dyn MediaEngine>,
    state: NegotiationState,

    channel: Option<FramedChannel>,
    channel_rx: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    attempts: u32,
    retry_at: Option<Instant>,

    media: Option<Box<dyn MediaPeer>>,
    media_tx: mpsc::UnboundedSender<MediaEvent>,
    media_rx: mpsc::UnboundedReceiver<MediaEvent>,
    has_remote_description: bool,
    pending_candidates: Vec<IceCandidate>,

    share_video: bool,
    video_offered: bool,
    awaiting_answer: bool,

    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl PeerSession {
    pub fn spawn(
        peer_id: PeerId,
        descriptor: PeerDescriptor,
        options: SessionOptions,
        engine: Arc<dyn MediaEngine>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> PeerSessionHandle {
        let (cmd_tx, commands) = mpsc::unbounded_channel();
        let (media_tx, media_rx) = mpsc::unbounded_channel();

        let session = Self {
            peer_id,
            descriptor,
            share_video: options.share_video,
            options,
            engine,
            state: NegotiationState::Idle,
            channel: None,
            channel_rx: None,
            attempts: 0,
            retry_at: None,
            media: None,
            media_tx,
            media_rx,
            has_remote_description: false,
            pending_candidates: Vec::new(),
            video_offered: false,
            awaiting_answer: false,
            commands,
            events,
        };
        tokio::spawn(session.run());

        PeerSessionHandle {
            peer_id,
            descriptor,
            cmd_tx,
        }
    }

    async fn run(mut self) {
        info!(peer_id = %self.peer_id, peer = %self.descriptor, "Peer session started");

        self.open_channel();

        while !self.state.is_terminal() {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => self.shutdown(None).await,
                },

                Some(event) = next_channel_event(&mut self.channel_rx) => {
                    self.handle_channel_event(event).await;
                }

                Some(event) = self.media_rx.recv() => {
                    self.handle_media_event(event).await;
                }

                _ = retry_timer(self.retry_at) => {
                    self.retry_at = None;
                    debug!(peer_id = %self.peer_id, attempt = self.attempts, "Redialing peer");
                    self.open_channel();
                }
            }
        }

        debug!(peer_id = %self.peer_id, "Peer session finished");
    }

    fn open_channel(&mut self) {
        let (channel, channel_rx) = FramedChannel::open(self.descriptor, self.options.accept_timeout);
        self.channel = Some(channel);
        self.channel_rx = Some(channel_rx);
        self.advance(NegotiationState::Connecting);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Send(message) => {
                let action = message.action();
                if let Err(e) = self.send(message) {
                    warn!(peer_id = %self.peer_id, action = %action, error = %e, "Dropping outbound message");
                    self.emit(SessionEvent::Error(self.peer_id, e));
                }
            }
            SessionCommand::StartVideo => {
                if let Err(e) = self.start_video().await {
                    self.shutdown(Some(e)).await;
                }
            }
            SessionCommand::StopVideo => self.stop_video().await,
            SessionCommand::Dispose { done } => {
                self.shutdown(None).await;
                let _ = done.send(());
            }
        }
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected(addr) => {
                if let Err(e) = self.on_connected(addr).await {
                    self.shutdown(Some(e)).await;
                }
            }
            ChannelEvent::Message(message) => {
                if let Err(e) = self.handle_message(message).await {
                    self.shutdown(Some(e)).await;
                }
            }
            ChannelEvent::Error(e) if e.is_connect() => self.on_connect_error(e).await,
            ChannelEvent::Error(e) => {
                warn!(peer_id = %self.peer_id, error = %e, "Ignoring bad line from peer");
            }
            ChannelEvent::Closed => {
                info!(peer_id = %self.peer_id, "Peer closed the channel");
                self.shutdown(Some(MeshError::ChannelClosed)).await;
            }
        }
    }

    async fn on_connect_error(&mut self, e: MeshError) {
        let can_retry = !self.descriptor.is_initiator
            && self.state == NegotiationState::Connecting
            && self.attempts < self.options.connect_retries;

        if !can_retry {
            error!(peer_id = %self.peer_id, peer = %self.descriptor, error = %e, "Giving up on peer");
            self.shutdown(Some(e)).await;
            return;
        }

        self.attempts += 1;
        warn!(
            peer_id = %self.peer_id,
            attempt = self.attempts,
            max = self.options.connect_retries,
            error = %e,
            "Dial failed, retrying"
        );
        self.channel = None;
        self.channel_rx = None;
        self.retry_at = Some(Instant::now() + self.options.retry_backoff);
    }

    async fn on_connected(&mut self, addr: SocketAddr) -> Result<()> {
        self.attempts = 0;
        self.emit(SessionEvent::Connected(self.peer_id, addr));

        // Peers that join after a handoff learn the director from us.
        if self.share_video {
            self.send(FramedMessage::ChangeUser)?;
        }

        if !self.descriptor.is_initiator {
            debug!(peer_id = %self.peer_id, "Connected, waiting for offer");
            return Ok(());
        }

        self.ensure_media().await?;
        self.advance(NegotiationState::AwaitingLocalDescription);
        self.send_offer().await
    }

    async fn handle_message(&mut self, message: FramedMessage) -> Result<()> {
        match message {
            FramedMessage::SetDescription(description) => {
                self.on_remote_description(description).await
            }
            FramedMessage::AddIceCandidate(candidate) => {
                self.on_remote_candidate(candidate).await;
                Ok(())
            }
            FramedMessage::ChangeUser => {
                // The new director's re-offer follows on this channel and
                // must be answered without our video.
                self.stop_video().await;
                self.emit(SessionEvent::Message(self.peer_id, FramedMessage::ChangeUser));
                Ok(())
            }
            other => {
                debug!(peer_id = %self.peer_id, action = %other.action(), "Forwarding to room");
                self.emit(SessionEvent::Message(self.peer_id, other));
                Ok(())
            }
        }
    }

    async fn on_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        if description.kind == SdpType::Answer
            && !self.awaiting_answer
            && self.state != NegotiationState::AwaitingRemoteDescription
        {
            warn!(peer_id = %self.peer_id, state = %self.state, "Ignoring unexpected answer");
            return Ok(());
        }

        self.ensure_media().await?;
        self.media()?
            .set_remote_description(&description)
            .await
            .map_err(MeshError::negotiation)?;
        self.has_remote_description = true;
        self.flush_candidates().await;

        match description.kind {
            SdpType::Offer => {
                debug!(peer_id = %self.peer_id, "Answering offer");
                self.advance(NegotiationState::AwaitingLocalDescription);

                let media = self.media()?;
                let sdp = media.create_answer().await.map_err(MeshError::negotiation)?;
                let answer = SessionDescription::answer(sdp);
                media
                    .set_local_description(&answer)
                    .await
                    .map_err(MeshError::negotiation)?;

                self.send(FramedMessage::SetDescription(answer))?;
                self.advance(NegotiationState::Established);
            }
            SdpType::Answer => {
                self.advance(NegotiationState::Established);
                if self.awaiting_answer {
                    self.awaiting_answer = false;
                    debug!(peer_id = %self.peer_id, "Renegotiation answered");
                    self.emit(SessionEvent::VideoSettled(self.peer_id));
                }
            }
        }

        self.offer_pending_video().await
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.has_remote_description {
            self.pending_candidates.push(candidate);
            return;
        }
        let Some(media) = self.media.as_deref() else {
            self.pending_candidates.push(candidate);
            return;
        };

        if let Err(e) = media.add_ice_candidate(&candidate).await {
            warn!(peer_id = %self.peer_id, error = %e, "Failed to add ICE candidate");
        }
    }

    async fn flush_candidates(&mut self) {
        let Some(media) = self.media.as_deref() else {
            return;
        };

        for candidate in self.pending_candidates.drain(..) {
            if let Err(e) = media.add_ice_candidate(&candidate).await {
                warn!(peer_id = %self.peer_id, error = %e, "Failed to add buffered ICE candidate");
            }
        }
    }

    async fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::LocalIceCandidate(candidate) => {
                if let Err(e) = self.send(FramedMessage::AddIceCandidate(candidate)) {
                    debug!(peer_id = %self.peer_id, error = %e, "Dropping local ICE candidate");
                }
            }
            MediaEvent::RemoteTrackAdded(kind) => {
                self.emit(SessionEvent::RemoteTrack(self.peer_id, kind));
            }
        }
    }

    async fn start_video(&mut self) -> Result<()> {
        self.share_video = true;

        if let Err(e) = self.send(FramedMessage::ChangeUser) {
            warn!(peer_id = %self.peer_id, error = %e, "Could not announce director change");
        }

        if let Some(media) = self.media.as_deref() {
            media.start_video().await.map_err(MeshError::negotiation)?;
        }

        if self.state == NegotiationState::Established {
            self.renegotiate().await
        } else {
            self.emit(SessionEvent::VideoSettled(self.peer_id));
            Ok(())
        }
    }

    async fn stop_video(&mut self) {
        self.share_video = false;
        self.video_offered = false;

        let Some(media) = self.media.as_deref() else {
            return;
        };
        if let Err(e) = media.stop_video().await {
            warn!(peer_id = %self.peer_id, error = %e, "Failed to stop video");
        }
    }

    /// Video attached after the last offer went out needs one more round.
    async fn offer_pending_video(&mut self) -> Result<()> {
        if self.state == NegotiationState::Established
            && self.share_video
            && !self.video_offered
            && !self.awaiting_answer
        {
            return self.renegotiate().await;
        }
        Ok(())
    }

    async fn renegotiate(&mut self) -> Result<()> {
        debug!(peer_id = %self.peer_id, "Re-offering with local video");
        self.awaiting_answer = true;
        self.send_offer().await
    }

    async fn send_offer(&mut self) -> Result<()> {
        let media = self.media()?;
        let sdp = media.create_offer().await.map_err(MeshError::negotiation)?;
        let offer = SessionDescription::offer(sdp);
        media
            .set_local_description(&offer)
            .await
            .map_err(MeshError::negotiation)?;

        self.video_offered = self.share_video;
        self.send(FramedMessage::SetDescription(offer))?;
        self.advance(NegotiationState::AwaitingRemoteDescription);
        Ok(())
    }

    async fn ensure_media(&mut self) -> Result<()> {
        if self.media.is_some() {
            return Ok(());
        }

        let media = self
            .engine
            .create_peer(self.peer_id, self.media_tx.clone())
            .await
            .map_err(MeshError::negotiation)?;

        if self.share_video {
            media.start_video().await.map_err(MeshError::negotiation)?;
        }

        self.media = Some(media);
        Ok(())
    }

    fn media(&self) -> Result<&dyn MediaPeer> {
        self.media
            .as_deref()
            .ok_or_else(|| MeshError::Negotiation("Media peer not created".into()))
    }

    fn send(&self, message: FramedMessage) -> Result<()> {
        self.channel
            .as_ref()
            .ok_or(MeshError::NotConnected)?
            .send(message)
    }

    fn advance(&mut self, next: NegotiationState) {
        if !self.state.can_advance_to(next) {
            return;
        }

        debug!(peer_id = %self.peer_id, from = %self.state, to = %next, "Negotiation state changed");
        self.state = next;
        self.emit(SessionEvent::StateChanged(self.peer_id, next));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn shutdown(&mut self, error: Option<MeshError>) {
        if self.state.is_terminal() {
            return;
        }

        self.retry_at = None;
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        self.channel_rx = None;

        if let Some(media) = self.media.take() {
            if let Err(e) = media.close().await {
                warn!(peer_id = %self.peer_id, error = %e, "Failed to close media peer");
            }
        }
        self.pending_candidates.clear();
        self.state = NegotiationState::Closed;

        match &error {
            Some(e) => warn!(peer_id = %self.peer_id, error = %e, "Peer session closed"),
            None => info!(peer_id = %self.peer_id, "Peer session disposed"),
        }
        self.emit(SessionEvent::Closed(self.peer_id, error));
    }
}

async fn next_channel_event(
    channel_rx: &mut Option<mpsc::UnboundedReceiver<ChannelEvent>>,
) -> Option<ChannelEvent> {
    match channel_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn retry_timer(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
