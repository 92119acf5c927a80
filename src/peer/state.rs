use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::debounce::Debounce;
use crate::peer::engine::PeerSession;
use crate::peer::types::{EngineEvent, IceCandidate, RemoteStream};
use crate::transport::{InboundFrame, InboundSender};
use crate::utils::random_id;

/// Состояние сессии
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    OfferReady,
    Negotiating,
    Connected,
    Closed,
}

/// Очередной вход для оркестратора
#[derive(Debug)]
pub(crate) enum SessionInput {
    Engine(EngineEvent),
    Frame(InboundFrame),
    HandshakeDue,
}

/// Одна попытка подключения. Живёт от start() до stop(), принадлежит оркестратору.
pub struct Session {
    id: String,
    started_at: DateTime<Utc>,
    state: SessionState,
    pub(crate) peer: Box<dyn PeerSession>,
    pub(crate) remote_stream: RemoteStream,

    pub(crate) answer_applied: bool,
    pub(crate) handshake_sent: bool,
    pub(crate) stream_attached: bool,
    pub(crate) gathering_complete: bool,

    pub(crate) local_candidates: Vec<IceCandidate>,
    /// Кандидаты, полученные до установки remote description
    pub(crate) pending_remote: Vec<IceCandidate>,

    pub(crate) debounce: Debounce,

    engine_rx: UnboundedReceiver<EngineEvent>,
    inbound_tx: InboundSender,
    inbound_rx: UnboundedReceiver<InboundFrame>,
    due_tx: UnboundedSender<()>,
    due_rx: UnboundedReceiver<()>,
}

impl Session {
    pub(crate) fn new(peer: Box<dyn PeerSession>, engine_rx: UnboundedReceiver<EngineEvent>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        Self {
            id: random_id(),
            started_at: Utc::now(),
            state: SessionState::Idle,
            peer,
            remote_stream: RemoteStream::default(),
            answer_applied: false,
            handshake_sent: false,
            stream_attached: false,
            gathering_complete: false,
            local_candidates: Vec::new(),
            pending_remote: Vec::new(),
            debounce: Debounce::new(),
            engine_rx,
            inbound_tx,
            inbound_rx,
            due_tx,
            due_rx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn answer_applied(&self) -> bool {
        self.answer_applied
    }

    pub fn handshake_sent(&self) -> bool {
        self.handshake_sent
    }

    pub fn remote_stream(&self) -> &RemoteStream {
        &self.remote_stream
    }

    pub fn local_candidates(&self) -> &[IceCandidate] {
        &self.local_candidates
    }

    pub fn pending_remote_candidates(&self) -> &[IceCandidate] {
        &self.pending_remote
    }

    /// Возвращает предыдущее состояние, если оно изменилось
    pub(crate) fn transition(&mut self, to: SessionState) -> Option<SessionState> {
        if self.state == to {
            return None;
        }
        let from = std::mem::replace(&mut self.state, to);
        Some(from)
    }

    pub(crate) fn inbound_sender(&self) -> InboundSender {
        self.inbound_tx.clone()
    }

    pub(crate) fn due_sender(&self) -> UnboundedSender<()> {
        self.due_tx.clone()
    }

    pub(crate) async fn next_input(&mut self) -> Option<SessionInput> {
        tokio::select! {
            Some(event) = self.engine_rx.recv() => Some(SessionInput::Engine(event)),
            Some(frame) = self.inbound_rx.recv() => Some(SessionInput::Frame(frame)),
            Some(()) = self.due_rx.recv() => Some(SessionInput::HandshakeDue),
            else => None,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("answer_applied", &self.answer_applied)
            .field("handshake_sent", &self.handshake_sent)
            .field("local_candidates", &self.local_candidates.len())
            .field("pending_remote", &self.pending_remote.len())
            .finish()
    }
}
