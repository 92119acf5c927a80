use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::logger::{dump_candidate, ErrorKind, Notifier, SessionEvent, WarningKind};
use crate::peer::codec;
use crate::peer::engine::{PeerEngine, PlaybackSink};
use crate::peer::ice::{analyze_candidates, IceServerSource};
use crate::peer::state::{Session, SessionInput, SessionState};
use crate::peer::types::{ConnectionState, Description, EngineEvent, IceCandidate, SdpKind};
use crate::signaling::{self, InboundMessage};
use crate::transport::{DispatchPolicy, Dispatched, InboundFrame, SignalingTransport};

/// Ведёт одну сессию за раз: offer -> транспорт -> answer/кандидаты -> плеер
pub struct SessionOrchestrator {
    engine: Arc<dyn PeerEngine>,
    transport: Box<dyn SignalingTransport>,
    ice: IceServerSource,
    http: reqwest::Client,
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn PlaybackSink>,
    session: Option<Session>,
}

fn change_state(session: &mut Session, notifier: &dyn Notifier, to: SessionState) {
    if let Some(from) = session.transition(to) {
        info!("Session {} state {:?} -> {:?}", session.id(), from, to);
        notifier.notify(SessionEvent::StateChanged { from, to });
    }
}

fn report_warning(notifier: &dyn Notifier, kind: WarningKind, message: impl Into<String>) {
    notifier.notify(SessionEvent::Warning {
        kind,
        message: message.into(),
    });
}

fn report_error(notifier: &dyn Notifier, kind: ErrorKind, message: impl Into<String>) {
    notifier.notify(SessionEvent::Error {
        kind,
        message: message.into(),
    });
}

/// Ошибка применения кандидата не фатальна
async fn apply_remote_candidate(session: &Session, notifier: &dyn Notifier, candidate: IceCandidate) {
    dump_candidate("REMOTE", &candidate);
    if let Err(e) = session.peer.add_remote_candidate(candidate).await {
        debug!("Failure during add_ice_candidate: {e}");
        report_warning(notifier, WarningKind::CandidateApply, e.to_string());
    }
}

impl SessionOrchestrator {
    pub fn new(
        engine: Arc<dyn PeerEngine>,
        transport: Box<dyn SignalingTransport>,
        ice: IceServerSource,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn PlaybackSink>,
    ) -> Self {
        Self {
            engine,
            transport,
            ice,
            http: reqwest::Client::new(),
            notifier,
            sink,
            session: None,
        }
    }

    /// HTTP клиент для запроса relay credentials
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(Session::state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Есть сессия, и она не закрыта
    pub fn is_live(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.is_closed())
            .unwrap_or(false)
    }

    /// Idle -> OfferReady. При ошибке сессия не создаётся.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.is_live() {
            return Err(SessionError::AlreadyActive);
        }

        let ice_servers = match self.ice.resolve(&self.http).await {
            Ok(servers) => servers,
            Err(e) => {
                report_error(&*self.notifier, ErrorKind::Setup, e.to_string());
                return Err(e);
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let peer = match self.engine.create_session(ice_servers, events_tx).await {
            Ok(peer) => peer,
            Err(e) => {
                let err = SessionError::Setup(e.to_string());
                report_error(&*self.notifier, ErrorKind::Setup, err.to_string());
                return Err(err);
            }
        };

        if let Err(e) = peer.create_local_offer().await {
            if let Err(close_err) = peer.close().await {
                debug!("Close after failed offer: {close_err}");
            }
            let err = SessionError::Setup(e.to_string());
            report_error(&*self.notifier, ErrorKind::Setup, err.to_string());
            return Err(err);
        }

        let mut session = Session::new(peer, events_rx);
        info!(
            "Session {} started at {} via {} signaling",
            session.id(),
            session.started_at(),
            self.transport.name()
        );
        change_state(&mut session, &*self.notifier, SessionState::OfferReady);
        // предыдущая закрытая сессия (если была) уничтожается здесь
        self.session = Some(session);
        Ok(())
    }

    /// OfferReady -> Negotiating. Handshake уходит не больше одного раза за сессию.
    pub async fn dispatch(&mut self) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.handshake_sent {
            return Err(SessionError::HandshakeAlreadySent);
        }
        if session.state() != SessionState::OfferReady {
            return Err(SessionError::InvalidState(session.state()));
        }

        let description = session
            .peer
            .local_description()
            .await
            .ok_or_else(|| SessionError::Negotiation("local description missing".into()))?;
        let token = codec::encode(&description)
            .map_err(|e| SessionError::Negotiation(format!("cannot encode offer: {e}")))?;
        debug!("Local: {}", token);

        session.handshake_sent = true;
        session.debounce.cancel();

        let dispatched = match self
            .transport
            .send_offer(&token, session.inbound_sender())
            .await
        {
            Ok(dispatched) => dispatched,
            Err(e) => {
                report_error(&*self.notifier, ErrorKind::Transport, e.to_string());
                return Err(e.into());
            }
        };
        change_state(session, &*self.notifier, SessionState::Negotiating);

        if let Dispatched::Answer(answer) = dispatched {
            if let Err(e) = self.apply_answer(&answer).await {
                report_error(&*self.notifier, ErrorKind::Negotiation, e.to_string());
                return Err(e);
            }
        }
        Ok(())
    }

    /// Negotiating -> Connected. Повторный answer игнорируется.
    pub async fn apply_answer(&mut self, token: &str) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.answer_applied {
            debug!("Remote answer already applied, ignoring duplicate");
            return Ok(());
        }
        if session.state() != SessionState::Negotiating {
            return Err(SessionError::InvalidState(session.state()));
        }

        let answer: Description = codec::decode(token)?;
        if answer.kind != SdpKind::Answer {
            return Err(SessionError::Negotiation(format!(
                "expected a final answer, got {:?}",
                answer.kind
            )));
        }

        session
            .peer
            .set_remote_answer(answer)
            .await
            .map_err(|e| SessionError::Negotiation(e.to_string()))?;
        session.answer_applied = true;
        change_state(session, &*self.notifier, SessionState::Connected);

        let pending = std::mem::take(&mut session.pending_remote);
        if !pending.is_empty() {
            info!("Applying {} buffered remote candidates", pending.len());
        }
        for candidate in pending {
            apply_remote_candidate(session, &*self.notifier, candidate).await;
        }

        if !session.stream_attached {
            session.stream_attached = true;
            self.sink.attach(&session.remote_stream);
            self.notifier.notify(SessionEvent::Ready);
        }
        Ok(())
    }

    /// До answer кандидат откладывается, после применяется сразу
    pub async fn add_candidate(&mut self, candidate: IceCandidate) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.is_closed() {
            report_warning(
                &*self.notifier,
                WarningKind::Discarded,
                "candidate for closed session discarded",
            );
            return Ok(());
        }

        if !session.answer_applied {
            debug!("Remote candidate buffered until answer is applied");
            session.pending_remote.push(candidate);
            return Ok(());
        }
        apply_remote_candidate(session, &*self.notifier, candidate).await;
        Ok(())
    }

    async fn add_candidate_payload(&mut self, payload: Value) -> Result<(), SessionError> {
        match signaling::parse_candidate(payload) {
            Ok(candidate) => self.add_candidate(candidate).await,
            Err(e) => {
                report_warning(
                    &*self.notifier,
                    WarningKind::CandidateApply,
                    format!("malformed candidate: {e}"),
                );
                Ok(())
            }
        }
    }

    /// Разбор одного сообщения от сервера. Ничто здесь не фатально для сессии.
    pub async fn handle_message(&mut self, message: InboundMessage) {
        if !self.is_live() {
            report_warning(
                &*self.notifier,
                WarningKind::Discarded,
                "message for inactive session discarded",
            );
            return;
        }

        match message {
            InboundMessage::Answer(payload) => {
                if let Err(e) = self.apply_answer(&payload.answer).await {
                    report_error(&*self.notifier, ErrorKind::Negotiation, e.to_string());
                }
            }
            InboundMessage::NewCandidate(payload) => {
                if let Err(e) = self.add_candidate_payload(payload).await {
                    debug!("Candidate not applied: {e}");
                }
            }
            InboundMessage::Disconnect(payload) => {
                info!(
                    "Closing connection: {}",
                    payload.message.as_deref().unwrap_or("server disconnect")
                );
                self.transport.close().await;
                if let Some(session) = self.session.as_mut() {
                    session.debounce.cancel();
                    if let Err(e) = session.peer.close().await {
                        warn!("Peer close failed: {e}");
                    }
                    change_state(session, &*self.notifier, SessionState::Closed);
                }
            }
            InboundMessage::Unsupported { kind } => report_warning(
                &*self.notifier,
                WarningKind::Protocol,
                format!("unsupported message type '{kind}'"),
            ),
            InboundMessage::Malformed { reason } => {
                report_warning(&*self.notifier, WarningKind::Protocol, reason)
            }
        }
    }

    async fn handle_frame(&mut self, frame: InboundFrame) -> Result<(), SessionError> {
        match frame {
            InboundFrame::Text(text) => {
                self.handle_message(signaling::parse_inbound(&text)).await;
            }
            InboundFrame::Closed(reason) => {
                if !self.is_live() {
                    debug!("Channel closed after session end");
                    return Ok(());
                }
                let message = match reason {
                    Some(reason) => format!("signaling channel closed: {reason}"),
                    None => "signaling channel closed".to_string(),
                };
                report_error(&*self.notifier, ErrorKind::Transport, message);
            }
        }
        Ok(())
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) -> Result<(), SessionError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.is_closed() {
            debug!("Engine event after close ignored: {:?}", event);
            return Ok(());
        }

        match event {
            EngineEvent::LocalCandidate(Some(candidate)) => {
                session.local_candidates.push(candidate);
                if let DispatchPolicy::Debounced(delay) = self.transport.dispatch_policy() {
                    if !session.handshake_sent {
                        let due = session.due_sender();
                        session.debounce.arm(delay, due);
                    }
                }
            }
            EngineEvent::LocalCandidate(None) => {
                if session.gathering_complete {
                    debug!("Repeated end of gathering ignored");
                    return Ok(());
                }
                session.gathering_complete = true;
                session.debounce.cancel();
                info!(
                    "ICE gathering complete, {} local candidates",
                    session.local_candidates.len()
                );
                analyze_candidates(&session.local_candidates);
                if session.state() == SessionState::OfferReady && !session.handshake_sent {
                    return self.dispatch().await;
                }
            }
            EngineEvent::ConnectionState(state) => {
                self.notifier
                    .notify(SessionEvent::ConnectionState { state });
                if state == ConnectionState::Failed {
                    report_error(
                        &*self.notifier,
                        ErrorKind::Connection,
                        "peer connection failed",
                    );
                }
            }
            EngineEvent::RemoteTrack(track) => {
                info!("Track added: {:?}", track.kind);
                session.remote_stream.tracks.push(track.clone());
                if session.stream_attached {
                    self.sink.add_track(&track);
                }
            }
        }
        Ok(())
    }

    async fn handshake_due(&mut self) -> Result<(), SessionError> {
        match self.session.as_ref() {
            Some(s) if s.state() == SessionState::OfferReady && !s.handshake_sent => {
                self.dispatch().await
            }
            _ => Ok(()),
        }
    }

    async fn process(&mut self, input: SessionInput) -> Result<(), SessionError> {
        match input {
            SessionInput::Engine(event) => self.handle_engine_event(event).await,
            SessionInput::Frame(frame) => self.handle_frame(frame).await,
            SessionInput::HandshakeDue => self.handshake_due().await,
        }
    }

    /// Ждёт и применяет один вход живой сессии. `None`, если сессии нет или входы иссякли.
    pub async fn process_next(&mut self) -> Option<Result<(), SessionError>> {
        if !self.is_live() {
            return None;
        }
        let input = self.session.as_mut()?.next_input().await?;
        Some(self.process(input).await)
    }

    /// Цикл событий до закрытия сессии или сигнала остановки; затем stop()
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), SessionError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let next = {
                let Some(session) = self.session.as_mut().filter(|s| !s.is_closed()) else {
                    break;
                };
                tokio::select! {
                    _ = &mut shutdown => None,
                    input = session.next_input() => Some(input),
                }
            };

            match next {
                None => {
                    info!("Shutdown requested");
                    break;
                }
                Some(None) => {
                    debug!("Session inputs exhausted");
                    break;
                }
                Some(Some(input)) => {
                    if let Err(e) = self.process(input).await {
                        warn!("Session input failed: {e}");
                    }
                }
            }
        }

        if self.is_live() {
            self.stop().await?;
        }
        Ok(())
    }

    /// any -> Closed. Ошибка release сообщается, но сессия всё равно закрывается.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.is_closed() {
            return Ok(());
        }

        info!("Stopping session {}", session.id());
        session.debounce.cancel();
        if session.handshake_sent {
            if let Err(e) = self.transport.release().await {
                warn!("Transport release failed: {e}");
                report_error(&*self.notifier, ErrorKind::Transport, e.to_string());
            }
        }
        if let Err(e) = session.peer.close().await {
            warn!("Peer close failed: {e}");
        }
        change_state(session, &*self.notifier, SessionState::Closed);
        Ok(())
    }
}
