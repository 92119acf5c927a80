use async_trait::async_trait;
use tokio::sync::mpsc;
use webrtc::ice_transport::ice_server::RTCIceServer;

use crate::error::EngineError;
use crate::peer::types::{Description, EngineEvent, IceCandidate, RemoteStream, RemoteTrack};

pub type EngineEvents = mpsc::UnboundedSender<EngineEvent>;

/// Фабрика peer-сессий поверх медиадвижка
#[async_trait]
pub trait PeerEngine: Send + Sync {
    /// Создаёт сессию с одним аудио и одним видео трансивером (sendrecv).
    /// Кандидаты, смена состояния и входящие треки приходят в `events`.
    async fn create_session(
        &self,
        ice_servers: Vec<RTCIceServer>,
        events: EngineEvents,
    ) -> Result<Box<dyn PeerSession>, EngineError>;
}

/// Возможности одной peer-сессии, которые нужны оркестратору
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Создаёт и фиксирует локальный offer. Повторный вызов - ошибка.
    async fn create_local_offer(&self) -> Result<Description, EngineError>;

    /// Текущее локальное описание; после конца сбора содержит все кандидаты.
    async fn local_description(&self) -> Option<Description>;

    /// Применяет answer ровно один раз.
    async fn set_remote_answer(&self, answer: Description) -> Result<(), EngineError>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    /// Идемпотентно.
    async fn close(&self) -> Result<(), EngineError>;
}

/// Куда подключается удалённый поток (плеер)
pub trait PlaybackSink: Send + Sync {
    /// Вызывается один раз на сессию, когда answer применён
    fn attach(&self, stream: &RemoteStream);

    /// Трек, пришедший после подключения
    fn add_track(&self, track: &RemoteTrack);
}
