// Сообщения сигнального сервера: конверт {"type", "payload"} для /ws и {"sdp"} для /stream

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::UserCredentials;
use crate::peer::types::IceCandidate;

pub const CONNECT: &str = "connect";
pub const ANSWER: &str = "answer";
pub const NEW_CANDIDATE: &str = "new_candidate";
pub const DISCONNECT: &str = "disconnect";

/// Общий конверт сообщения постоянного канала
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConnectPayload {
    pub sdp: String,
    pub user: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnswerPayload {
    pub answer: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Кандидат приходит либо как есть, либо завёрнутым в {"candidate": {...}}
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CandidatePayload {
    Wrapped { candidate: IceCandidate },
    Raw(IceCandidate),
}

impl From<CandidatePayload> for IceCandidate {
    fn from(payload: CandidatePayload) -> Self {
        match payload {
            CandidatePayload::Wrapped { candidate } => candidate,
            CandidatePayload::Raw(candidate) => candidate,
        }
    }
}

/// Разобранное входящее сообщение
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Answer(AnswerPayload),
    /// payload проверяется при применении, испорченный кандидат не ломает разбор кадра
    NewCandidate(Value),
    Disconnect(DisconnectPayload),
    Unsupported { kind: String },
    Malformed { reason: String },
}

/// Разбор в два шага: конверт, потом payload по типу
pub fn parse_inbound(text: &str) -> InboundMessage {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            return InboundMessage::Malformed {
                reason: format!("invalid envelope: {e}"),
            }
        }
    };

    match envelope.kind.as_str() {
        ANSWER => match serde_json::from_value::<AnswerPayload>(envelope.payload) {
            Ok(payload) => InboundMessage::Answer(payload),
            Err(e) => InboundMessage::Malformed {
                reason: format!("invalid answer payload: {e}"),
            },
        },
        NEW_CANDIDATE => InboundMessage::NewCandidate(envelope.payload),
        DISCONNECT => {
            // пустой payload или null тоже допустимы
            let payload = serde_json::from_value(envelope.payload).unwrap_or_default();
            InboundMessage::Disconnect(payload)
        }
        // connect шлёт только клиент
        _ => InboundMessage::Unsupported {
            kind: envelope.kind,
        },
    }
}

pub fn parse_candidate(payload: Value) -> Result<IceCandidate, serde_json::Error> {
    serde_json::from_value::<CandidatePayload>(payload).map(IceCandidate::from)
}

fn frame<T: Serialize>(kind: &str, payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        kind: kind.to_string(),
        payload: serde_json::to_value(payload)?,
    })
}

pub fn connect_frame(offer: &str, credentials: &UserCredentials) -> Result<String, serde_json::Error> {
    frame(
        CONNECT,
        &ConnectPayload {
            sdp: offer.to_string(),
            user: credentials.user.clone(),
            password: credentials.password.clone(),
        },
    )
}

pub fn disconnect_frame(message: &str) -> Result<String, serde_json::Error> {
    frame(
        DISCONNECT,
        &DisconnectPayload {
            message: Some(message.to_string()),
        },
    )
}

/// Тело POST /stream
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub sdp: String,
}

/// Ответ POST /stream
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamResponse {
    pub sdp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_frame_shape() {
        let creds = UserCredentials {
            user: "viewer".into(),
            password: "secret".into(),
        };
        let raw = connect_frame("T0tFTg==", &creds).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "connect",
                "payload": {"sdp": "T0tFTg==", "user": "viewer", "password": "secret"}
            })
        );
    }

    #[test]
    fn test_disconnect_frame_shape() {
        let value: Value = serde_json::from_str(&disconnect_frame("client stop").unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "disconnect", "payload": {"message": "client stop"}})
        );
    }

    #[test]
    fn test_parse_known_types() {
        assert_eq!(
            parse_inbound(r#"{"type":"answer","payload":{"answer":"abc"}}"#),
            InboundMessage::Answer(AnswerPayload {
                answer: "abc".into()
            })
        );
        assert!(matches!(
            parse_inbound(r#"{"type":"new_candidate","payload":{"candidate":"x"}}"#),
            InboundMessage::NewCandidate(_)
        ));
        assert_eq!(
            parse_inbound(r#"{"type":"disconnect"}"#),
            InboundMessage::Disconnect(DisconnectPayload::default())
        );
        assert_eq!(
            parse_inbound(r#"{"type":"disconnect","payload":{"message":"bye"}}"#),
            InboundMessage::Disconnect(DisconnectPayload {
                message: Some("bye".into())
            })
        );
    }

    #[test]
    fn test_unknown_and_broken_frames() {
        assert_eq!(
            parse_inbound(r#"{"type":"bogus","payload":{}}"#),
            InboundMessage::Unsupported {
                kind: "bogus".into()
            }
        );
        assert!(matches!(
            parse_inbound(r#"{"type":"connect","payload":{}}"#),
            InboundMessage::Unsupported { .. }
        ));
        assert!(matches!(
            parse_inbound("not json"),
            InboundMessage::Malformed { .. }
        ));
        assert!(matches!(
            parse_inbound(r#"{"payload":{}}"#),
            InboundMessage::Malformed { .. }
        ));
        assert!(matches!(
            parse_inbound(r#"{"type":"answer","payload":{"sdp":"x"}}"#),
            InboundMessage::Malformed { .. }
        ));
    }

    #[test]
    fn test_candidate_raw_or_wrapped() {
        let raw = json!({"candidate": "candidate:1 1 udp 1 10.0.0.2 5000 typ host", "sdpMid": "0", "sdpMLineIndex": 0});
        let wrapped = json!({"candidate": raw.clone()});

        let a = parse_candidate(raw).unwrap();
        let b = parse_candidate(wrapped).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.sdp_mline_index, Some(0));

        assert!(parse_candidate(json!({"foo": 1})).is_err());
        assert!(parse_candidate(json!("nope")).is_err());
    }
}
