pub mod channel;
pub mod http;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{Settings, SignalingMode, UserCredentials};
use crate::error::TransportError;

pub use channel::ChannelTransport;
pub use http::HttpTransport;

/// Кадр от сервера, прочитанный фоновой задачей канала
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// Сервер закрыл канал без disconnect (или чтение оборвалось)
    Closed(Option<String>),
}

pub type InboundSender = UnboundedSender<InboundFrame>;

/// Когда оркестратору отправлять offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// дождаться конца сбора кандидатов, они попадут в SDP
    AwaitGathering,
    /// через фиксированную задержку после кандидата или сразу по концу сбора
    Debounced(Duration),
}

/// Результат отправки offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// ответ получен сразу (закодированный answer)
    Answer(String),
    /// answer придёт позже по каналу
    AwaitingAnswer,
}

#[async_trait]
pub trait SignalingTransport: Send {
    fn name(&self) -> &'static str;

    fn dispatch_policy(&self) -> DispatchPolicy;

    /// Отправка закодированного offer. Входящие кадры (если они есть) идут в `inbound`.
    async fn send_offer(
        &mut self,
        offer: &str,
        inbound: InboundSender,
    ) -> Result<Dispatched, TransportError>;

    /// Закрыть канал без уведомления сервера (после disconnect от сервера)
    async fn close(&mut self);

    /// Освобождение ресурсов на сервере при stop()
    async fn release(&mut self) -> Result<(), TransportError>;
}

pub fn build_transport(settings: &Settings) -> Box<dyn SignalingTransport> {
    let signaling = &settings.signaling;
    match signaling.mode {
        SignalingMode::Http => Box::new(HttpTransport::new(signaling.http_url())),
        SignalingMode::Websocket => Box::new(ChannelTransport::new(
            signaling.ws_url(),
            settings.credentials.clone().unwrap_or_else(UserCredentials::default),
            signaling.handshake_delay(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_follows_mode() {
        let mut settings = Settings::default();
        settings.credentials = Some(UserCredentials {
            user: "u".into(),
            password: "p".into(),
        });

        let ws = build_transport(&settings);
        assert_eq!(ws.name(), "websocket");
        assert_eq!(
            ws.dispatch_policy(),
            DispatchPolicy::Debounced(Duration::from_millis(2000))
        );

        settings.signaling.mode = SignalingMode::Http;
        let http = build_transport(&settings);
        assert_eq!(http.name(), "http");
        assert_eq!(http.dispatch_policy(), DispatchPolicy::AwaitGathering);
    }
}
