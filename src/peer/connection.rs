use crate::error::EngineError;
use crate::logger::dump_candidate;
use crate::peer::engine::{EngineEvents, PeerEngine, PeerSession};
use crate::peer::types::{
    ConnectionState, Description, EngineEvent, IceCandidate, MediaKind, RemoteTrack, SdpKind,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::{
    configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
    RTCPeerConnection,
};
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

/// Движок на базе webrtc-rs
pub struct WebRtcEngine {
    api: API,
}

impl WebRtcEngine {
    /// Медиадвижок с кодеками и интерсепторами по умолчанию
    pub fn new() -> Result<Self, EngineError> {
        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| EngineError::Setup(e.to_string()))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)
            .map_err(|e| EngineError::Setup(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();
        Ok(Self { api })
    }
}

#[async_trait]
impl PeerEngine for WebRtcEngine {
    async fn create_session(
        &self,
        ice_servers: Vec<RTCIceServer>,
        events: EngineEvents,
    ) -> Result<Box<dyn PeerSession>, EngineError> {
        info!("Creating peer connection with {} ICE servers", ice_servers.len());
        let pc = Arc::new(
            self.api
                .new_peer_connection(rtc_config(ice_servers))
                .await
                .map_err(|e| EngineError::Setup(e.to_string()))?,
        );

        // Локальные кандидаты; None означает конец сбора
        let cand_tx = events.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let tx = cand_tx.clone();
            Box::pin(async move {
                match cand {
                    Some(c) => match c.to_json() {
                        Ok(init) => {
                            let candidate = IceCandidate::from(init);
                            dump_candidate("LOCAL", &candidate);
                            let _ = tx.send(EngineEvent::LocalCandidate(Some(candidate)));
                        }
                        Err(e) => warn!("Failed to serialize local candidate: {e}"),
                    },
                    None => {
                        debug!("ICE candidate gathering completed (null candidate received)");
                        let _ = tx.send(EngineEvent::LocalCandidate(None));
                    }
                }
            })
        }));

        pc.on_ice_gathering_state_change(Box::new(move |state| {
            debug!("ICE gathering state changed to: {:?}", state);
            Box::pin(async {})
        }));

        let state_tx = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            info!("Peer connection state changed to: {:?}", st);
            let _ = state_tx.send(EngineEvent::ConnectionState(ConnectionState::from(st)));
            Box::pin(async {})
        }));

        let track_tx = events;
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                match MediaKind::from_codec_type(track.kind()) {
                    Some(kind) => {
                        let remote = RemoteTrack {
                            id: track.id(),
                            stream_id: track.stream_id(),
                            kind,
                        };
                        debug!("Remote track added: {:?}", remote);
                        let _ = track_tx.send(EngineEvent::RemoteTrack(remote));
                    }
                    None => warn!("Ignoring remote track of unknown kind"),
                }
                Box::pin(async {})
            },
        ));

        // один видео и один аудио трансивер, оба в обе стороны
        for kind in [RTPCodecType::Video, RTPCodecType::Audio] {
            let init = RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Sendrecv,
                send_encodings: vec![],
            };
            if let Err(e) = pc.add_transceiver_from_kind(kind, Some(init)).await {
                let _ = pc.close().await;
                return Err(EngineError::Setup(format!(
                    "failed to add {kind:?} transceiver: {e}"
                )));
            }
        }

        Ok(Box::new(WebRtcSession {
            pc,
            offer_created: AtomicBool::new(false),
            answer_applied: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Создает конфигурацию для peer connection
fn rtc_config(ice_servers: Vec<RTCIceServer>) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

struct WebRtcSession {
    pc: Arc<RTCPeerConnection>,
    offer_created: AtomicBool,
    answer_applied: AtomicBool,
    closed: AtomicBool,
}

#[async_trait]
impl PeerSession for WebRtcSession {
    async fn create_local_offer(&self) -> Result<Description, EngineError> {
        if self.offer_created.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Negotiation(
                "local offer already created for this session".into(),
            ));
        }

        debug!("Creating offer...");
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| EngineError::Negotiation(e.to_string()))?;
        debug!("Setting local description (offer)...");
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| EngineError::Negotiation(e.to_string()))?;

        self.local_description()
            .await
            .ok_or_else(|| EngineError::Negotiation("local description missing".into()))
    }

    async fn local_description(&self) -> Option<Description> {
        let desc = self.pc.local_description().await?;
        match Description::try_from(&desc) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("Local description not usable: {e}");
                None
            }
        }
    }

    async fn set_remote_answer(&self, answer: Description) -> Result<(), EngineError> {
        if self.answer_applied.load(Ordering::SeqCst) {
            return Err(EngineError::Negotiation(
                "remote answer already applied".into(),
            ));
        }

        let desc = match answer.kind {
            SdpKind::Answer => RTCSessionDescription::answer(answer.sdp),
            SdpKind::Pranswer => RTCSessionDescription::pranswer(answer.sdp),
            SdpKind::Offer => {
                return Err(EngineError::Negotiation(
                    "expected an answer, got an offer".into(),
                ))
            }
        }
        .map_err(|e| EngineError::Negotiation(e.to_string()))?;

        debug!("Setting remote description (answer)...");
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| EngineError::Negotiation(e.to_string()))?;
        self.answer_applied.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        self.pc
            .add_ice_candidate(candidate.into())
            .await
            .map_err(|e| EngineError::Candidate(e.to_string()))
    }

    async fn close(&self) -> Result<(), EngineError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing peer connection");
        self.pc
            .close()
            .await
            .map_err(|e| EngineError::Close(e.to_string()))
    }
}
