use crate::runtime::{Runtime, WebRuntime};
use crate::{LinkError, LinkEvent, LinkEvents, LinkFactory, LinkState, PeerLink, SdpKind, byte_rms_level};
use async_trait::async_trait;
use huddle_core::utils::{
    DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, DEFAULT_STUN_ADDR_3, DEFAULT_STUN_ADDR_4,
};
use huddle_core::{IceCandidate, IceServerConfig, UserId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AnalyserNode, AudioContext, MediaStream, RtcIceCandidateInit, RtcPeerConnection,
    RtcPeerConnectionIceEvent, RtcPeerConnectionState, RtcRtpSender, RtcSdpType,
    RtcSessionDescriptionInit, RtcTrackEvent,
};

const LEVEL_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
const ANALYSER_FFT_SIZE: u32 = 512;

pub type RemoteStreamHandler = Rc<dyn Fn(UserId, MediaStream)>;

/// Creates browser `RTCPeerConnection`s.
pub struct WebLinkFactory {
    ice_servers: Vec<IceServerConfig>,
    local_stream: Option<MediaStream>,
    on_remote_stream: Option<RemoteStreamHandler>,
}

impl WebLinkFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            ice_servers,
            local_stream: None,
            on_remote_stream: None,
        }
    }

    pub fn with_local_stream(mut self, stream: MediaStream) -> Self {
        self.local_stream = Some(stream);
        self
    }

    pub fn on_remote_stream(mut self, handler: RemoteStreamHandler) -> Self {
        self.on_remote_stream = Some(handler);
        self
    }

    fn configuration(&self) -> web_sys::RtcConfiguration {
        let rtc_config = web_sys::RtcConfiguration::new();
        let ice_servers_arr = js_sys::Array::new();

        if self.ice_servers.is_empty() {
            let stun_urls = js_sys::Array::new();
            for url in [
                DEFAULT_STUN_ADDR,
                DEFAULT_STUN_ADDR_2,
                DEFAULT_STUN_ADDR_3,
                DEFAULT_STUN_ADDR_4,
            ] {
                stun_urls.push(&JsValue::from_str(url));
            }
            let stun_server = web_sys::RtcIceServer::new();
            stun_server.set_urls(&stun_urls);
            ice_servers_arr.push(&stun_server);
        }

        for server_config in &self.ice_servers {
            let rtc_ice_server = web_sys::RtcIceServer::new();
            let urls = js_sys::Array::new();
            for url in &server_config.urls {
                urls.push(&JsValue::from_str(url));
            }
            rtc_ice_server.set_urls(&urls);
            if let Some(username) = &server_config.username {
                rtc_ice_server.set_username(username);
            }
            if let Some(credential) = &server_config.credential {
                rtc_ice_server.set_credential(credential);
            }
            ice_servers_arr.push(&rtc_ice_server);
        }

        rtc_config.set_ice_servers(&ice_servers_arr);
        rtc_config
    }

    fn open(&self, peer: UserId, events: LinkEvents) -> Result<WebLink, JsValue> {
        let pc = RtcPeerConnection::new_with_configuration(&self.configuration())?;

        if let Some(stream) = &self.local_stream {
            for track in stream.get_audio_tracks().iter() {
                if let Ok(track) = track.dyn_into::<web_sys::MediaStreamTrack>() {
                    pc.add_track_0(&track, stream);
                }
            }
        }

        let ice_events = events.clone();
        let onicecandidate = Closure::<dyn FnMut(RtcPeerConnectionIceEvent)>::wrap(Box::new(
            move |ev: RtcPeerConnectionIceEvent| {
                if let Some(candidate) = ev.candidate() {
                    ice_events.emit(LinkEvent::LocalCandidate(IceCandidate {
                        candidate: candidate.candidate(),
                        sdp_mid: candidate.sdp_mid(),
                        sdp_m_line_index: candidate.sdp_m_line_index(),
                        username_fragment: None,
                    }));
                }
            },
        ));
        pc.set_onicecandidate(Some(onicecandidate.as_ref().unchecked_ref()));

        let state_events = events.clone();
        let state_pc = pc.clone();
        let onconnectionstatechange = Closure::<dyn FnMut(JsValue)>::wrap(Box::new(move |_| {
            let state = link_state(state_pc.connection_state());
            debug!("Peer connection state changed for user {}: {:?}", peer, state);
            state_events.emit(LinkEvent::StateChanged(state));
        }));
        pc.set_onconnectionstatechange(Some(onconnectionstatechange.as_ref().unchecked_ref()));

        let closed = Rc::new(Cell::new(false));
        let monitor: Rc<RefCell<Option<AudioContext>>> = Rc::new(RefCell::new(None));
        let track_events = events;
        let track_closed = closed.clone();
        let track_monitor = monitor.clone();
        let handler = self.on_remote_stream.clone();
        let ontrack = Closure::<dyn FnMut(RtcTrackEvent)>::wrap(Box::new(move |ev: RtcTrackEvent| {
            let Some(stream) = ev
                .streams()
                .get(0)
                .dyn_into::<MediaStream>()
                .ok()
            else {
                return;
            };
            if let Some(handler) = &handler {
                handler(peer, stream.clone());
            }
            if track_monitor.borrow().is_some() {
                return;
            }
            match monitor_levels(&stream, track_events.clone(), track_closed.clone()) {
                Ok(context) => *track_monitor.borrow_mut() = Some(context),
                Err(e) => warn!("Audio level monitor for user {} unavailable: {:?}", peer, e),
            }
        }));
        pc.set_ontrack(Some(ontrack.as_ref().unchecked_ref()));

        Ok(WebLink {
            peer,
            pc,
            closed,
            monitor,
            _onicecandidate: onicecandidate,
            _onconnectionstatechange: onconnectionstatechange,
            _ontrack: ontrack,
        })
    }
}

#[async_trait(?Send)]
impl LinkFactory for WebLinkFactory {
    async fn create(
        &self,
        peer: UserId,
        events: LinkEvents,
    ) -> Result<Box<dyn PeerLink>, LinkError> {
        let link = self.open(peer, events).map_err(js_error)?;
        Ok(Box::new(link))
    }
}

pub struct WebLink {
    peer: UserId,
    pc: RtcPeerConnection,
    closed: Rc<Cell<bool>>,
    monitor: Rc<RefCell<Option<AudioContext>>>,
    _onicecandidate: Closure<dyn FnMut(RtcPeerConnectionIceEvent)>,
    _onconnectionstatechange: Closure<dyn FnMut(JsValue)>,
    _ontrack: Closure<dyn FnMut(RtcTrackEvent)>,
}

impl WebLink {
    async fn apply_local(&self, kind: RtcSdpType, sdp: Option<&str>) -> Result<(), JsValue> {
        let desc = RtcSessionDescriptionInit::new(kind);
        if let Some(sdp) = sdp {
            desc.set_sdp(sdp);
        }
        JsFuture::from(self.pc.set_local_description(&desc)).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl PeerLink for WebLink {
    async fn create_offer(&self) -> Result<String, LinkError> {
        let offer = JsFuture::from(self.pc.create_offer()).await.map_err(js_error)?;
        let sdp = sdp_of(&offer)?;
        self.apply_local(RtcSdpType::Offer, Some(&sdp))
            .await
            .map_err(js_error)?;
        Ok(sdp)
    }

    async fn create_answer(&self) -> Result<String, LinkError> {
        let answer = JsFuture::from(self.pc.create_answer()).await.map_err(js_error)?;
        let sdp = sdp_of(&answer)?;
        self.apply_local(RtcSdpType::Answer, Some(&sdp))
            .await
            .map_err(js_error)?;
        Ok(sdp)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<(), LinkError> {
        let desc = RtcSessionDescriptionInit::new(match kind {
            SdpKind::Offer => RtcSdpType::Offer,
            SdpKind::Answer => RtcSdpType::Answer,
        });
        desc.set_sdp(sdp);
        JsFuture::from(self.pc.set_remote_description(&desc))
            .await
            .map_err(js_error)?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), LinkError> {
        self.apply_local(RtcSdpType::Rollback, None)
            .await
            .map_err(js_error)
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), LinkError> {
        let init = RtcIceCandidateInit::new(&candidate.candidate);
        init.set_sdp_mid(candidate.sdp_mid.as_deref());
        init.set_sdp_m_line_index(candidate.sdp_m_line_index);
        JsFuture::from(self.pc.add_ice_candidate_with_opt_rtc_ice_candidate_init(Some(&init)))
            .await
            .map_err(js_error)?;
        Ok(())
    }

    async fn set_audio_enabled(&self, enabled: bool) -> Result<(), LinkError> {
        for sender in self.pc.get_senders().iter() {
            let Ok(sender) = sender.dyn_into::<RtcRtpSender>() else {
                continue;
            };
            if let Some(track) = sender.track() {
                track.set_enabled(enabled);
            }
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.set(true);
        self.pc.set_onicecandidate(None);
        self.pc.set_onconnectionstatechange(None);
        self.pc.set_ontrack(None);
        self.pc.close();
        if let Some(context) = self.monitor.borrow_mut().take() {
            let _ = context.close();
        }
        debug!("Closed link to user {}", self.peer);
    }
}

/// Samples the analyser until the link closes or the peer stops listening.
fn monitor_levels(
    stream: &MediaStream,
    events: LinkEvents,
    closed: Rc<Cell<bool>>,
) -> Result<AudioContext, JsValue> {
    let context = AudioContext::new()?;
    let source = context.create_media_stream_source(stream)?;
    let analyser: AnalyserNode = context.create_analyser()?;
    analyser.set_fft_size(ANALYSER_FFT_SIZE);
    source.connect_with_audio_node(&analyser)?;

    wasm_bindgen_futures::spawn_local(async move {
        let mut samples = vec![0u8; analyser.fft_size() as usize];
        while !closed.get() {
            WebRuntime.sleep(LEVEL_SAMPLE_INTERVAL).await;
            analyser.get_byte_time_domain_data(&mut samples);
            if !events.emit(LinkEvent::AudioLevel(byte_rms_level(&samples))) {
                break;
            }
        }
    });

    Ok(context)
}

fn link_state(state: RtcPeerConnectionState) -> LinkState {
    match state {
        RtcPeerConnectionState::New => LinkState::New,
        RtcPeerConnectionState::Connecting => LinkState::Connecting,
        RtcPeerConnectionState::Connected => LinkState::Connected,
        RtcPeerConnectionState::Disconnected => LinkState::Disconnected,
        RtcPeerConnectionState::Failed => LinkState::Failed,
        _ => LinkState::Closed,
    }
}

fn sdp_of(description: &JsValue) -> Result<String, LinkError> {
    js_sys::Reflect::get(description, &"sdp".into())
        .map_err(js_error)?
        .as_string()
        .ok_or_else(|| LinkError::Failed("session description without sdp".into()))
}

fn js_error(err: JsValue) -> LinkError {
    LinkError::Failed(format!("{:?}", err))
}
