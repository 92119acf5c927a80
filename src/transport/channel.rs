use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{DispatchPolicy, Dispatched, InboundFrame, InboundSender, SignalingTransport};
use crate::config::UserCredentials;
use crate::error::TransportError;
use crate::signaling::{connect_frame, disconnect_frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const CLIENT_STOP_MESSAGE: &str = "client stop";

/// Постоянный WebSocket канал: connect с offer, дальше answer/new_candidate/disconnect от сервера
pub struct ChannelTransport {
    url: String,
    credentials: UserCredentials,
    handshake_delay: Duration,
    sink: Option<SplitSink<WsStream, Message>>,
    reader: Option<JoinHandle<()>>,
}

impl ChannelTransport {
    pub fn new(url: impl Into<String>, credentials: UserCredentials, handshake_delay: Duration) -> Self {
        Self {
            url: url.into(),
            credentials,
            handshake_delay,
            sink: None,
            reader: None,
        }
    }

    fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    async fn shutdown(&mut self) {
        self.stop_reader();
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close().await {
                debug!("WebSocket close: {e}");
            }
        }
    }
}

/// Фоновое чтение кадров; владелец сессии получает их через канал
async fn read_frames(mut stream: SplitStream<WsStream>, inbound: InboundSender) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!("WS <- {}", text);
                if inbound.send(InboundFrame::Text(text.to_string())).is_err() {
                    return;
                }
            }
            Ok(Message::Close(frame)) => {
                let reason = frame.map(|f| f.reason.to_string());
                info!("WebSocket closed by server: {:?}", reason);
                let _ = inbound.send(InboundFrame::Closed(reason));
                return;
            }
            Ok(Message::Binary(_)) => warn!("Ignoring binary WebSocket frame"),
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket read failed: {e}");
                let _ = inbound.send(InboundFrame::Closed(Some(e.to_string())));
                return;
            }
        }
    }
    let _ = inbound.send(InboundFrame::Closed(None));
}

#[async_trait]
impl SignalingTransport for ChannelTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::Debounced(self.handshake_delay)
    }

    async fn send_offer(
        &mut self,
        offer: &str,
        inbound: InboundSender,
    ) -> Result<Dispatched, TransportError> {
        let frame = connect_frame(offer, &self.credentials)?;

        if self.sink.is_none() {
            info!("Connecting to {}", self.url);
            let (ws, _response) = connect_async(self.url.as_str()).await?;
            info!("Connected to WebSocket: true");
            let (sink, stream) = ws.split();
            self.sink = Some(sink);
            self.reader = Some(tokio::spawn(read_frames(stream, inbound)));
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.send(Message::text(frame)).await?;
            debug!("WS -> connect");
        }
        Ok(Dispatched::AwaitingAnswer)
    }

    async fn close(&mut self) {
        info!("Closing WebSocket");
        self.shutdown().await;
    }

    async fn release(&mut self) -> Result<(), TransportError> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        let sent = match disconnect_frame(CLIENT_STOP_MESSAGE) {
            Ok(frame) => sink.send(Message::text(frame)).await.map_err(TransportError::from),
            Err(e) => Err(TransportError::from(e)),
        };
        self.shutdown().await;
        sent
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.stop_reader();
    }
}
