use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogSettings;
use crate::peer::engine::PlaybackSink;
use crate::peer::state::SessionState;
use crate::peer::types::{ConnectionState, IceCandidate, RemoteStream, RemoteTrack};

/// Инициализация tracing. RUST_LOG имеет приоритет над конфигурацией.
pub fn init_logging(settings: &LogSettings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ssc_stream={},webrtc=warn", settings.level).into());

    let fmt_layer = if settings.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    // повторная инициализация (например, в тестах) не считается ошибкой
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

/// Печать ICE-candidate при появлении (Trickle-ICE)
pub fn dump_candidate(label: &str, cand: &IceCandidate) {
    tracing::debug!(
        "Trickle {label}: candidate={} sdp_mid={:?} sdp_mline_index={:?} username_fragment={:?}",
        cand.candidate,
        cand.sdp_mid,
        cand.sdp_mline_index,
        cand.username_fragment
    );
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Setup,
    Transport,
    Negotiation,
    /// peer connection перешёл в failed
    Connection,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// неизвестный или испорченный тип сообщения
    Protocol,
    /// кандидат не удалось применить
    CandidateApply,
    /// сообщение пришло в закрытую сессию
    Discarded,
}

/// Уведомления для UI
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// Поток подключен к плееру; срабатывает один раз на сессию
    Ready,
    ConnectionState {
        state: ConnectionState,
    },
    Warning {
        kind: WarningKind,
        message: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: SessionEvent);
}

/// Уведомления в лог, без UI
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: SessionEvent) {
        match &event {
            SessionEvent::StateChanged { from, to } => {
                info!("Session state {:?} -> {:?}", from, to)
            }
            SessionEvent::Ready => info!("Remote stream attached, session ready"),
            SessionEvent::ConnectionState { state } => info!("Peer connection: {:?}", state),
            SessionEvent::Warning { kind, message } => warn!("{:?}: {}", kind, message),
            SessionEvent::Error { kind, message } => error!("{:?} error: {}", kind, message),
        }
    }
}

/// Плеер-заглушка: только пишет в лог
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl PlaybackSink for LogSink {
    fn attach(&self, stream: &RemoteStream) {
        info!(
            "Playback attached with {} track(s): {:?}",
            stream.tracks.len(),
            stream.tracks
        );
    }

    fn add_track(&self, track: &RemoteTrack) {
        info!(
            "Playback track added: {:?} id={} stream={}",
            track.kind, track.id, track.stream_id
        );
    }
}
