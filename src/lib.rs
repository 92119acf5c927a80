pub mod config;
pub mod debounce;
pub mod error;
pub mod logger;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod transport;
pub mod utils;

use std::sync::Arc;

pub use config::{load_settings, Settings};
pub use error::SessionError;
pub use session::SessionOrchestrator;

use crate::logger::{LogSink, TracingNotifier};
use crate::peer::ice::IceServerSource;
use crate::peer::WebRtcEngine;
use crate::transport::build_transport;

/// Сессия с движком webrtc-rs, транспортом из настроек и выводом в лог; до Ctrl-C
pub async fn run(settings: Settings) -> Result<(), SessionError> {
    let engine = WebRtcEngine::new().map_err(|e| SessionError::Setup(e.to_string()))?;

    let mut orchestrator = SessionOrchestrator::new(
        Arc::new(engine),
        build_transport(&settings),
        IceServerSource::from_settings(&settings),
        Arc::new(TracingNotifier),
        Arc::new(LogSink),
    );

    orchestrator.start().await?;
    orchestrator
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {e}");
            }
        })
        .await
}
