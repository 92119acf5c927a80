use thiserror::Error;

use crate::peer::state::SessionState;

/// Ошибка разбора закодированного токена
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token does not hold a valid document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ошибки адаптера WebRTC
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("peer connection setup failed: {0}")]
    Setup(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("candidate rejected: {0}")]
    Candidate(String),

    #[error("peer connection close failed: {0}")]
    Close(String),
}

/// Ошибки сигнального транспорта (HTTP или WebSocket)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("signaling endpoint answered with status {status}")]
    Status { status: u16 },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("signaling channel failed: {0}")]
    Channel(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed signaling frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Ошибки загрузки и проверки конфигурации
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Ошибки оркестратора сессии
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session setup failed: {0}")]
    Setup(String),

    #[error("signaling transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("a session is already active")]
    AlreadyActive,

    #[error("no session has been started")]
    NoSession,

    /// offer уже отправлялся; нужен stop() и новый start()
    #[error("handshake already sent for this session")]
    HandshakeAlreadySent,

    #[error("operation not allowed in state {0:?}")]
    InvalidState(SessionState),
}

impl From<DecodeError> for SessionError {
    fn from(err: DecodeError) -> Self {
        SessionError::Negotiation(format!("undecodable description: {err}"))
    }
}
