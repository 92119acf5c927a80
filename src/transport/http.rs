use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::{DispatchPolicy, Dispatched, InboundSender, SignalingTransport};
use crate::error::TransportError;
use crate::signaling::{StreamRequest, StreamResponse};

/// Один POST с offer, в ответе answer. Повторов нет.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SignalingTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::AwaitGathering
    }

    async fn send_offer(
        &mut self,
        offer: &str,
        _inbound: InboundSender,
    ) -> Result<Dispatched, TransportError> {
        info!("POST offer to {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&StreamRequest {
                sdp: offer.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let body: StreamResponse = response.json().await?;
        debug!("Answer received ({} bytes)", body.sdp.len());
        Ok(Dispatched::Answer(body.sdp))
    }

    async fn close(&mut self) {}

    async fn release(&mut self) -> Result<(), TransportError> {
        info!("DELETE {}", self.endpoint);
        let response = self.client.delete(&self.endpoint).send().await?;
        let status = response.status();
        // поток уже остановлен на сервере
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
            })
        }
    }
}
