use crate::media::media_engine::{MediaEngine, MediaPeer};
use crate::media::media_event::{MediaEvent, MediaKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use ciak_core::{IceCandidate, PeerId, SdpType, SessionDescription};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine as CodecRegistry};
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const STREAM_ID: &str = "ciak";

/// [`MediaEngine`] on top of the `webrtc` crate, for LAN use (no ICE servers).
///
/// Every peer connection shares the same local VP8 and Opus tracks; an
/// external capture pipeline feeds them through [`WebRtcEngine::write_video_sample`]
/// and [`WebRtcEngine::write_audio_sample`].
pub struct WebRtcEngine {
    api: RwLock<Option<Arc<API>>>,
    video_track: Arc<TrackLocalStaticSample>,
    audio_track: Arc<TrackLocalStaticSample>,
    peers: Arc<DashMap<PeerId, Arc<RTCPeerConnection>>>,
}

impl WebRtcEngine {
    pub fn new() -> Self {
        let video_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            "video".to_owned(),
            STREAM_ID.to_owned(),
        ));

        let audio_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            "audio".to_owned(),
            STREAM_ID.to_owned(),
        ));

        Self {
            api: RwLock::new(None),
            video_track,
            audio_track,
            peers: Arc::new(DashMap::new()),
        }
    }

    /// Push one encoded VP8 frame to every peer currently receiving video.
    pub async fn write_video_sample(&self, data: Bytes, duration: Duration) -> Result<()> {
        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };
        self.video_track
            .write_sample(&sample)
            .await
            .context("Failed to write video sample")
    }

    pub async fn write_audio_sample(&self, data: Bytes, duration: Duration) -> Result<()> {
        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };
        self.audio_track
            .write_sample(&sample)
            .await
            .context("Failed to write audio sample")
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

impl Default for WebRtcEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEngine for WebRtcEngine {
    async fn start(&self) -> Result<()> {
        let mut api = self.api.write().await;
        if api.is_some() {
            return Ok(());
        }

        let mut codecs = CodecRegistry::default();
        codecs
            .register_default_codecs()
            .context("Failed to register codecs")?;
        let registry = register_default_interceptors(Registry::new(), &mut codecs)
            .context("Failed to register interceptors")?;

        *api = Some(Arc::new(
            APIBuilder::new()
                .with_media_engine(codecs)
                .with_interceptor_registry(registry)
                .build(),
        ));

        info!("WebRTC media engine started");
        Ok(())
    }

    async fn create_peer(
        &self,
        peer_id: PeerId,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Box<dyn MediaPeer>> {
        let api = self
            .api
            .read()
            .await
            .clone()
            .context("Media engine not started")?;

        let connection = Arc::new(
            api.new_peer_connection(RTCConfiguration {
                ice_servers: vec![],
                ..Default::default()
            })
            .await?,
        );

        connection.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            Box::pin(async move {
                debug!(peer_id = %peer_id, state = ?s, "Peer connection state changed");
            })
        }));

        let ice_tx = events.clone();
        connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(MediaEvent::LocalIceCandidate(IceCandidate {
                    sdp: init.candidate,
                    sdp_m_line_index: init.sdp_mline_index.unwrap_or(0),
                    sdp_mid: init.sdp_mid.unwrap_or_default(),
                }));
            })
        }));

        let track_tx = events;
        connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();

            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Video => MediaKind::Video,
                    _ => MediaKind::Audio,
                };
                info!(peer_id = %peer_id, kind = %kind, "Remote track added");
                let _ = tx.send(MediaEvent::RemoteTrackAdded(kind));
            })
        }));

        // Viewers still offer both kinds. Local tracks are added on top
        // while we direct.
        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            connection
                .add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .with_context(|| format!("Failed to add {} transceiver", kind))?;
        }

        self.peers.insert(peer_id, connection.clone());

        Ok(Box::new(WebRtcPeer {
            peer_id,
            connection,
            tracks: [self.video_track.clone(), self.audio_track.clone()],
            senders: Mutex::new(Vec::new()),
            peers: self.peers.clone(),
        }))
    }

    async fn shutdown(&self) {
        let connections: Vec<_> = self
            .peers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.peers.clear();

        for connection in connections {
            if let Err(e) = connection.close().await {
                warn!(error = %e, "Failed to close peer connection");
            }
        }

        *self.api.write().await = None;
        info!("WebRTC media engine stopped");
    }
}

struct WebRtcPeer {
    peer_id: PeerId,
    connection: Arc<RTCPeerConnection>,
    /// Local video and audio, attached together.
    tracks: [Arc<TrackLocalStaticSample>; 2],
    senders: Mutex<Vec<Arc<RTCRtpSender>>>,
    peers: Arc<DashMap<PeerId, Arc<RTCPeerConnection>>>,
}

fn to_rtc(description: &SessionDescription) -> Result<RTCSessionDescription> {
    let sdp = description.sdp.clone();
    let rtc = match description.kind {
        SdpType::Offer => RTCSessionDescription::offer(sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(sdp)?,
    };
    Ok(rtc)
}

#[async_trait]
impl MediaPeer for WebRtcPeer {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.connection.create_offer(None).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.connection.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()> {
        self.connection
            .set_local_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        self.connection
            .set_remote_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.sdp.clone(),
            sdp_mid: Some(candidate.sdp_mid.clone()),
            sdp_mline_index: Some(candidate.sdp_m_line_index),
            username_fragment: None,
        };
        self.connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn start_video(&self) -> Result<()> {
        let mut senders = self.senders.lock().await;
        if !senders.is_empty() {
            return Ok(());
        }

        for track in &self.tracks {
            let sender = self
                .connection
                .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .with_context(|| format!("Failed to add {} track", track.kind()))?;
            senders.push(sender);
        }

        debug!(peer_id = %self.peer_id, "Local tracks attached");
        Ok(())
    }

    async fn stop_video(&self) -> Result<()> {
        let senders = std::mem::take(&mut *self.senders.lock().await);
        if senders.is_empty() {
            return Ok(());
        }

        for sender in senders {
            self.connection
                .remove_track(&sender)
                .await
                .context("Failed to remove local track")?;
        }

        debug!(peer_id = %self.peer_id, "Local tracks detached");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peers.remove(&self.peer_id);
        self.connection.close().await?;
        Ok(())
    }
}
