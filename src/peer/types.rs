use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

/// Тип SDP описания
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Pranswer,
    Answer,
}

/// SDP описание в том виде, в котором оно уходит на провод: `{"type", "sdp"}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Description {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl Description {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

impl TryFrom<&RTCSessionDescription> for Description {
    type Error = String;

    fn try_from(desc: &RTCSessionDescription) -> Result<Self, Self::Error> {
        let kind = match desc.sdp_type {
            RTCSdpType::Offer => SdpKind::Offer,
            RTCSdpType::Pranswer => SdpKind::Pranswer,
            RTCSdpType::Answer => SdpKind::Answer,
            other => return Err(format!("unsupported sdp type {other}")),
        };
        Ok(Self {
            kind,
            sdp: desc.sdp.clone(),
        })
    }
}

/// ICE кандидат в формате браузера (`sdpMid`, `sdpMLineIndex`)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, alias = "sdp_mid")]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex", alias = "sdp_mline_index")]
    pub sdp_mline_index: Option<u16>,
    #[serde(
        default,
        alias = "username_fragment",
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl From<RTCIceCandidateInit> for IceCandidate {
    fn from(init: RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
            username_fragment: init.username_fragment,
        }
    }
}

impl From<IceCandidate> for RTCIceCandidateInit {
    fn from(c: IceCandidate) -> Self {
        RTCIceCandidateInit {
            candidate: c.candidate,
            sdp_mid: c.sdp_mid,
            sdp_mline_index: c.sdp_mline_index,
            username_fragment: c.username_fragment,
        }
    }
}

/// Конфигурация ICE сервера
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default)]
    pub id: String,
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

/// Состояние peer connection, как его сообщает движок
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl From<RTCPeerConnectionState> for ConnectionState {
    fn from(st: RTCPeerConnectionState) -> Self {
        match st {
            RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
            RTCPeerConnectionState::Connected => ConnectionState::Connected,
            RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
            RTCPeerConnectionState::Failed => ConnectionState::Failed,
            RTCPeerConnectionState::Closed => ConnectionState::Closed,
            _ => ConnectionState::New,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_codec_type(kind: RTPCodecType) -> Option<Self> {
        match kind {
            RTPCodecType::Audio => Some(MediaKind::Audio),
            RTPCodecType::Video => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Входящий трек удалённой стороны
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: MediaKind,
}

/// Накопленный удалённый медиапоток сессии
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteStream {
    pub tracks: Vec<RemoteTrack>,
}

/// События, которые движок отдаёт оркестратору
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// `None` означает конец сбора кандидатов
    LocalCandidate(Option<IceCandidate>),
    ConnectionState(ConnectionState),
    RemoteTrack(RemoteTrack),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_accepts_browser_and_snake_case_keys() {
        let browser: IceCandidate = serde_json::from_str(
            r#"{"candidate":"candidate:1 1 udp 2130706431 10.0.0.2 5000 typ host","sdpMid":"0","sdpMLineIndex":0}"#,
        )
        .unwrap();
        let snake: IceCandidate = serde_json::from_str(
            r#"{"candidate":"candidate:1 1 udp 2130706431 10.0.0.2 5000 typ host","sdp_mid":"0","sdp_mline_index":0}"#,
        )
        .unwrap();

        assert_eq!(browser, snake);
        assert_eq!(browser.sdp_mid.as_deref(), Some("0"));
        assert_eq!(browser.sdp_mline_index, Some(0));
    }

    #[test]
    fn test_candidate_serializes_in_browser_shape() {
        let c = IceCandidate {
            candidate: "candidate:2 1 udp 1694498815 1.2.3.4 6000 typ srflx".into(),
            sdp_mid: Some("1".into()),
            sdp_mline_index: Some(1),
            username_fragment: None,
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["sdpMid"], "1");
        assert_eq!(json["sdpMLineIndex"], 1);
        assert!(json.get("usernameFragment").is_none());
    }

    #[test]
    fn test_description_wire_shape() {
        let d = Description::answer("v=0\r\n");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["type"], "answer");
        assert_eq!(json["sdp"], "v=0\r\n");
    }

    #[test]
    fn test_connection_state_mapping() {
        assert_eq!(
            ConnectionState::from(RTCPeerConnectionState::Failed),
            ConnectionState::Failed
        );
        assert_eq!(
            ConnectionState::from(RTCPeerConnectionState::Unspecified),
            ConnectionState::New
        );
    }
}
