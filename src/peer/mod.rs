pub mod codec;
pub mod connection;
pub mod engine;
pub mod ice;
pub mod state;
pub mod types;

pub use connection::WebRtcEngine;
pub use engine::{EngineEvents, PeerEngine, PeerSession, PlaybackSink};
pub use state::{Session, SessionState};
pub use types::{Description, EngineEvent, IceCandidate, RemoteStream, RemoteTrack, ServerConfig};
