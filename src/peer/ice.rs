use crate::config::{OpenRelaySettings, Settings, TurnSettings};
use crate::error::SessionError;
use crate::peer::types::{IceCandidate, ServerConfig};
use crate::utils::add_ice_url_scheme;
use serde::Deserialize;
use tracing::{info, warn};
use webrtc::ice_transport::ice_server::RTCIceServer;

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Откуда берётся список ICE серверов для новой сессии
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IceServerSource {
    Default,
    Static(Vec<ServerConfig>),
    InternalTurn(TurnSettings),
    OpenRelay(OpenRelaySettings),
}

impl IceServerSource {
    /// Приоритет: свой TURN, open relay, явный список, STUN по умолчанию
    pub fn from_settings(settings: &Settings) -> Self {
        if let Some(turn) = &settings.turn {
            IceServerSource::InternalTurn(turn.clone())
        } else if let Some(relay) = &settings.open_relay {
            IceServerSource::OpenRelay(relay.clone())
        } else if !settings.ice_servers.is_empty() {
            IceServerSource::Static(settings.ice_servers.clone())
        } else {
            IceServerSource::Default
        }
    }

    pub async fn resolve(&self, http: &reqwest::Client) -> Result<Vec<RTCIceServer>, SessionError> {
        let servers = match self {
            IceServerSource::Default => {
                info!("Using default ICE servers");
                vec![RTCIceServer {
                    urls: vec![DEFAULT_STUN_SERVER.into()],
                    ..Default::default()
                }]
            }
            IceServerSource::Static(list) => {
                info!("Found {} configured ICE servers", list.len());
                user_ice_servers(list)
            }
            IceServerSource::InternalTurn(turn) => internal_turn_servers(turn),
            IceServerSource::OpenRelay(relay) => {
                info!("Found open relay config for {}", relay.app_name);
                fetch_relay_servers(http, &credentials_url(&relay.app_name), &relay.api_key)
                    .await?
            }
        };
        Ok(servers)
    }
}

/// Конфигурация серверов из настроек
pub fn user_ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn internal_turn_servers(turn: &TurnSettings) -> Vec<RTCIceServer> {
    turn.users
        .iter()
        .flat_map(|user| {
            ["stun", "turn"].map(|scheme| RTCIceServer {
                urls: vec![format!("{scheme}:{}:{}", turn.public_ip, turn.port)],
                username: user.user.clone(),
                credential: user.password.clone(),
            })
        })
        .collect()
}

pub fn credentials_url(app_name: &str) -> String {
    format!("https://{app_name}/api/v1/turn/credentials")
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Urls {
    One(String),
    Many(Vec<String>),
}

/// Дескриптор сервера из ответа relay API
#[derive(Debug, Deserialize)]
struct RelayServer {
    urls: Urls,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    credential: Option<String>,
}

impl From<RelayServer> for RTCIceServer {
    fn from(server: RelayServer) -> Self {
        let urls = match server.urls {
            Urls::One(url) => vec![url],
            Urls::Many(urls) => urls,
        };
        RTCIceServer {
            urls,
            username: server.username.unwrap_or_default(),
            credential: server.credential.unwrap_or_default(),
        }
    }
}

/// GET {url}?apiKey=... -> JSON массив серверов, используется как есть
pub async fn fetch_relay_servers(
    http: &reqwest::Client,
    url: &str,
    api_key: &str,
) -> Result<Vec<RTCIceServer>, SessionError> {
    let setup = |e: reqwest::Error| SessionError::Setup(format!("relay credentials: {e}"));

    let response = http
        .get(url)
        .query(&[("apiKey", api_key)])
        .send()
        .await
        .map_err(setup)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SessionError::Setup(format!(
            "relay credentials request returned {status}"
        )));
    }

    let servers: Vec<RelayServer> = response.json().await.map_err(setup)?;
    info!("Fetched {} relay servers", servers.len());
    Ok(servers.into_iter().map(RTCIceServer::from).collect())
}

pub fn analyze_candidates(candidates: &[IceCandidate]) {
    let mut host_count = 0;
    let mut srflx_count = 0;
    let mut relay_count = 0;

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            host_count += 1;
        } else if candidate.candidate.contains("typ srflx") {
            srflx_count += 1;
        } else if candidate.candidate.contains("typ relay") {
            relay_count += 1;
        }
    }

    info!(
        "Candidate analysis: {} host, {} srflx, {} relay",
        host_count, srflx_count, relay_count
    );

    if relay_count == 0 {
        warn!("No TURN relay candidates found! Connection through NAT may fail.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserCredentials;

    #[test]
    fn test_source_priority() {
        let mut settings = Settings::default();
        assert_eq!(IceServerSource::from_settings(&settings), IceServerSource::Default);

        settings.ice_servers.push(ServerConfig {
            id: "s".into(),
            r#type: "stun".into(),
            url: "stun.example.org:3478".into(),
            username: None,
            credential: None,
        });
        assert!(matches!(
            IceServerSource::from_settings(&settings),
            IceServerSource::Static(_)
        ));

        settings.open_relay = Some(OpenRelaySettings {
            app_name: "demo".into(),
            api_key: "key".into(),
        });
        assert!(matches!(
            IceServerSource::from_settings(&settings),
            IceServerSource::OpenRelay(_)
        ));

        settings.turn = Some(TurnSettings {
            public_ip: "203.0.113.7".into(),
            port: 3478,
            users: vec![],
        });
        assert!(matches!(
            IceServerSource::from_settings(&settings),
            IceServerSource::InternalTurn(_)
        ));
    }

    #[test]
    fn test_internal_turn_yields_stun_and_turn_per_user() {
        let turn = TurnSettings {
            public_ip: "203.0.113.7".into(),
            port: 3478,
            users: vec![
                UserCredentials {
                    user: "a".into(),
                    password: "pa".into(),
                },
                UserCredentials {
                    user: "b".into(),
                    password: "pb".into(),
                },
            ],
        };
        let servers = internal_turn_servers(&turn);
        assert_eq!(servers.len(), 4);
        assert_eq!(servers[0].urls, vec!["stun:203.0.113.7:3478".to_string()]);
        assert_eq!(servers[1].urls, vec!["turn:203.0.113.7:3478".to_string()]);
        assert_eq!(servers[3].username, "b");
        assert_eq!(servers[3].credential, "pb");
    }

    #[test]
    fn test_relay_descriptor_accepts_string_or_list() {
        let raw = r#"[
            {"urls": "stun:stun.relay.metered.ca:80"},
            {"urls": ["turn:global.relay.metered.ca:80", "turn:global.relay.metered.ca:443"],
             "username": "u1", "credential": "c1"}
        ]"#;
        let parsed: Vec<RelayServer> = serde_json::from_str(raw).unwrap();
        let servers: Vec<RTCIceServer> = parsed.into_iter().map(RTCIceServer::from).collect();

        assert_eq!(servers[0].urls.len(), 1);
        assert!(servers[0].username.is_empty());
        assert_eq!(servers[1].urls.len(), 2);
        assert_eq!(servers[1].credential, "c1");
    }

    #[tokio::test]
    async fn test_default_source_resolves_google_stun() {
        let servers = IceServerSource::Default
            .resolve(&reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(servers[0].urls, vec![DEFAULT_STUN_SERVER.to_string()]);
    }

    #[test]
    fn test_credentials_url() {
        assert_eq!(
            credentials_url("demo.metered.live"),
            "https://demo.metered.live/api/v1/turn/credentials"
        );
    }
}
