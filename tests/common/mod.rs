#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webrtc::ice_transport::ice_server::RTCIceServer;

use ssc_stream::error::{EngineError, TransportError};
use ssc_stream::logger::{ErrorKind, Notifier, SessionEvent, WarningKind};
use ssc_stream::peer::ice::IceServerSource;
use ssc_stream::peer::{
    Description, EngineEvent, EngineEvents, IceCandidate, PeerEngine, PeerSession, PlaybackSink,
    RemoteStream, RemoteTrack,
};
use ssc_stream::transport::{DispatchPolicy, Dispatched, InboundFrame, InboundSender, SignalingTransport};
use ssc_stream::SessionOrchestrator;

pub const OFFER_SDP: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=sendrecv\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=sendrecv\r\n";
pub const ANSWER_SDP: &str = "v=0\r\no=- 3 4 IN IP4 10.0.0.9\r\ns=-\r\nt=0 0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=sendrecv\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=sendrecv\r\n";

pub fn candidate(n: u16) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n} 1 udp 2130706431 10.0.0.{n} 5000 typ host"),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

/// Что происходило с поддельной peer-сессией
#[derive(Default)]
pub struct FakePeerLog {
    pub events: Mutex<Option<EngineEvents>>,
    pub answers: Mutex<Vec<Description>>,
    pub candidates: Mutex<Vec<IceCandidate>>,
    pub closed: AtomicBool,
    /// кандидаты с этой подстрокой отвергаются
    pub reject: Mutex<Option<String>>,
}

impl FakePeerLog {
    pub fn emit(&self, event: EngineEvent) {
        let guard = self.events.lock().unwrap();
        guard
            .as_ref()
            .expect("session not created")
            .send(event)
            .unwrap();
    }

    pub fn answers(&self) -> usize {
        self.answers.lock().unwrap().len()
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    pub log: Arc<FakePeerLog>,
}

struct FakePeer {
    log: Arc<FakePeerLog>,
}

#[async_trait]
impl PeerEngine for FakeEngine {
    async fn create_session(
        &self,
        _ice_servers: Vec<RTCIceServer>,
        events: EngineEvents,
    ) -> Result<Box<dyn PeerSession>, EngineError> {
        *self.log.events.lock().unwrap() = Some(events);
        Ok(Box::new(FakePeer {
            log: self.log.clone(),
        }))
    }
}

#[async_trait]
impl PeerSession for FakePeer {
    async fn create_local_offer(&self) -> Result<Description, EngineError> {
        Ok(Description::offer(OFFER_SDP))
    }

    async fn local_description(&self) -> Option<Description> {
        Some(Description::offer(OFFER_SDP))
    }

    async fn set_remote_answer(&self, answer: Description) -> Result<(), EngineError> {
        let mut answers = self.log.answers.lock().unwrap();
        if !answers.is_empty() {
            return Err(EngineError::Negotiation("duplicate answer".into()));
        }
        answers.push(answer);
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        if let Some(pattern) = self.log.reject.lock().unwrap().as_deref() {
            if candidate.candidate.contains(pattern) {
                return Err(EngineError::Candidate("rejected by engine".into()));
            }
        }
        self.log.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Транспорт без сети: считает отправки и отдаёт InboundSender тесту
#[derive(Default)]
pub struct FakeWire {
    pub offers: Mutex<Vec<String>>,
    pub inbound: Mutex<Option<InboundSender>>,
    pub releases: AtomicUsize,
}

impl FakeWire {
    pub fn sent(&self) -> usize {
        self.offers.lock().unwrap().len()
    }

    pub fn deliver(&self, text: &str) {
        let guard = self.inbound.lock().unwrap();
        guard
            .as_ref()
            .expect("offer not sent yet")
            .send(InboundFrame::Text(text.to_string()))
            .unwrap();
    }
}

pub struct FakeTransport {
    pub wire: Arc<FakeWire>,
    pub delay: Duration,
}

#[async_trait]
impl SignalingTransport for FakeTransport {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::Debounced(self.delay)
    }

    async fn send_offer(
        &mut self,
        offer: &str,
        inbound: InboundSender,
    ) -> Result<Dispatched, TransportError> {
        self.wire.offers.lock().unwrap().push(offer.to_string());
        *self.wire.inbound.lock().unwrap() = Some(inbound);
        Ok(Dispatched::AwaitingAnswer)
    }

    async fn close(&mut self) {}

    async fn release(&mut self) -> Result<(), TransportError> {
        self.wire.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<SessionEvent>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn warnings(&self, kind: WarningKind) -> usize {
        self.all()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Warning { kind: k, .. } if *k == kind))
            .count()
    }

    pub fn errors(&self, kind: ErrorKind) -> usize {
        self.all()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Error { kind: k, .. } if *k == kind))
            .count()
    }

    pub fn ready(&self) -> usize {
        self.all()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Ready))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct CountingSink {
    pub attached: AtomicUsize,
    pub late_tracks: Mutex<Vec<RemoteTrack>>,
}

impl CountingSink {
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }
}

impl PlaybackSink for CountingSink {
    fn attach(&self, _stream: &RemoteStream) {
        self.attached.fetch_add(1, Ordering::SeqCst);
    }

    fn add_track(&self, track: &RemoteTrack) {
        self.late_tracks.lock().unwrap().push(track.clone());
    }
}

pub struct Harness {
    pub orchestrator: SessionOrchestrator,
    pub engine: FakeEngine,
    pub notifier: Arc<RecordingNotifier>,
    pub sink: Arc<CountingSink>,
}

pub fn harness(transport: Box<dyn SignalingTransport>) -> Harness {
    let engine = FakeEngine::default();
    let notifier = Arc::new(RecordingNotifier::default());
    let sink = Arc::new(CountingSink::default());
    let orchestrator = SessionOrchestrator::new(
        Arc::new(engine.clone()),
        transport,
        IceServerSource::Default,
        notifier.clone(),
        sink.clone(),
    );
    Harness {
        orchestrator,
        engine,
        notifier,
        sink,
    }
}

pub fn fake_transport(delay: Duration) -> (Box<dyn SignalingTransport>, Arc<FakeWire>) {
    let wire = Arc::new(FakeWire::default());
    let transport = FakeTransport {
        wire: wire.clone(),
        delay,
    };
    (Box::new(transport), wire)
}
