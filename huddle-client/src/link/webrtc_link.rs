use crate::{LinkError, LinkEvent, LinkEvents, LinkFactory, LinkState, PeerLink, SdpKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use huddle_core::utils::{
    DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, DEFAULT_STUN_ADDR_3, DEFAULT_STUN_ADDR_4,
};
use huddle_core::{IceCandidate, IceServerConfig, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

pub type RemoteTrackHandler = Arc<dyn Fn(UserId, Arc<TrackRemote>) + Send + Sync>;

/// Creates `webrtc` peer connections with one audio transceiver each.
pub struct WebrtcLinkFactory {
    api: Arc<API>,
    ice_servers: Vec<RTCIceServer>,
    local_track: Option<Arc<TrackLocalStaticSample>>,
    on_remote_track: Option<RemoteTrackHandler>,
}

impl WebrtcLinkFactory {
    pub fn new(ice_servers: &[IceServerConfig]) -> Result<Self> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api: Arc::new(api),
            ice_servers: rtc_ice_servers(ice_servers),
            local_track: None,
            on_remote_track: None,
        })
    }

    /// Sends `track` to every peer; without one the links are receive-only.
    pub fn with_local_track(mut self, track: Arc<TrackLocalStaticSample>) -> Self {
        self.local_track = Some(track);
        self
    }

    pub fn on_remote_track(mut self, handler: RemoteTrackHandler) -> Self {
        self.on_remote_track = Some(handler);
        self
    }

    async fn open(&self, peer: UserId, events: LinkEvents) -> Result<WebrtcLink> {
        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };
        let pc = Arc::new(self.api.new_peer_connection(config).await?);

        let sender = match &self.local_track {
            Some(track) => {
                let track: Arc<dyn TrackLocal + Send + Sync> = track.clone();
                Some(pc.add_track(track).await.context("adding local audio track")?)
            }
            None => {
                pc.add_transceiver_from_kind(RTPCodecType::Audio, None)
                    .await
                    .context("adding audio transceiver")?;
                None
            }
        };

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let events = state_events.clone();
            Box::pin(async move {
                info!("Peer connection state changed for user {}: {:?}", peer, s);
                if let Some(state) = link_state(s) {
                    events.emit(LinkEvent::StateChanged(state));
                }
            })
        }));

        let ice_events = events.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events.emit(LinkEvent::LocalCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }));
            })
        }));

        if let Some(handler) = self.on_remote_track.clone() {
            pc.on_track(Box::new(
                move |track: Arc<TrackRemote>,
                      _receiver: Arc<RTCRtpReceiver>,
                      _transceiver: Arc<RTCRtpTransceiver>| {
                    let handler = handler.clone();
                    Box::pin(async move {
                        debug!("Remote track {} from user {}", track.id(), peer);
                        handler(peer, track);
                    })
                },
            ));
        }

        Ok(WebrtcLink {
            peer,
            pc,
            sender,
            track: self.local_track.clone(),
        })
    }
}

#[async_trait(?Send)]
impl LinkFactory for WebrtcLinkFactory {
    async fn create(
        &self,
        peer: UserId,
        events: LinkEvents,
    ) -> Result<Box<dyn PeerLink>, LinkError> {
        let link = self.open(peer, events).await.map_err(LinkError::failed)?;
        Ok(Box::new(link))
    }
}

pub struct WebrtcLink {
    peer: UserId,
    pc: Arc<RTCPeerConnection>,
    sender: Option<Arc<RTCRtpSender>>,
    track: Option<Arc<TrackLocalStaticSample>>,
}

impl WebrtcLink {
    async fn offer(&self) -> Result<String> {
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(offer.sdp)
    }

    async fn answer(&self) -> Result<String> {
        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        Ok(answer.sdp)
    }

    async fn apply_remote(&self, kind: SdpKind, sdp: &str) -> Result<()> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp.to_string())?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp.to_string())?,
        };
        self.pc.set_remote_description(desc).await?;
        Ok(())
    }

    async fn apply_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment.clone(),
        };
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn toggle_audio(&self, enabled: bool) -> Result<()> {
        let (Some(sender), Some(track)) = (&self.sender, &self.track) else {
            return Ok(());
        };
        let track: Option<Arc<dyn TrackLocal + Send + Sync>> = if enabled {
            Some(track.clone())
        } else {
            None
        };
        sender.replace_track(track).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl PeerLink for WebrtcLink {
    async fn create_offer(&self) -> Result<String, LinkError> {
        self.offer().await.map_err(LinkError::failed)
    }

    async fn create_answer(&self) -> Result<String, LinkError> {
        self.answer().await.map_err(LinkError::failed)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<(), LinkError> {
        self.apply_remote(kind, sdp).await.map_err(LinkError::failed)
    }

    async fn rollback(&self) -> Result<(), LinkError> {
        Err(LinkError::Unsupported("rollback"))
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), LinkError> {
        self.apply_candidate(candidate)
            .await
            .map_err(LinkError::failed)
    }

    async fn set_audio_enabled(&self, enabled: bool) -> Result<(), LinkError> {
        self.toggle_audio(enabled).await.map_err(LinkError::failed)
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("Closing link to user {} failed: {}", self.peer, e);
        }
    }
}

fn link_state(state: RTCPeerConnectionState) -> Option<LinkState> {
    match state {
        RTCPeerConnectionState::New => Some(LinkState::New),
        RTCPeerConnectionState::Connecting => Some(LinkState::Connecting),
        RTCPeerConnectionState::Connected => Some(LinkState::Connected),
        RTCPeerConnectionState::Disconnected => Some(LinkState::Disconnected),
        RTCPeerConnectionState::Failed => Some(LinkState::Failed),
        RTCPeerConnectionState::Closed => Some(LinkState::Closed),
        _ => None,
    }
}

fn rtc_ice_servers(servers: &[IceServerConfig]) -> Vec<RTCIceServer> {
    if servers.is_empty() {
        return vec![RTCIceServer {
            urls: [
                DEFAULT_STUN_ADDR,
                DEFAULT_STUN_ADDR_2,
                DEFAULT_STUN_ADDR_3,
                DEFAULT_STUN_ADDR_4,
            ]
            .iter()
            .map(|url| url.to_string())
            .collect(),
            ..Default::default()
        }];
    }

    servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}
