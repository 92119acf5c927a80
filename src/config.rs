// Конфигурация приложения: файл + переменные окружения SSC__*

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::peer::types::ServerConfig;

/// Способ обмена SDP с сервером
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalingMode {
    /// POST /stream, один запрос-ответ
    Http,
    /// постоянный канал /ws с типизированными сообщениями
    #[default]
    Websocket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingSettings {
    #[serde(default)]
    pub mode: SignalingMode,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default = "default_http_path")]
    pub http_path: String,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Задержка перед отправкой connect после очередного кандидата
    #[serde(default = "default_handshake_delay_ms")]
    pub handshake_delay_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_http_path() -> String {
    "/stream".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_handshake_delay_ms() -> u64 {
    2000
}

impl Default for SignalingSettings {
    fn default() -> Self {
        Self {
            mode: SignalingMode::default(),
            host: default_host(),
            port: default_port(),
            use_tls: false,
            http_path: default_http_path(),
            ws_path: default_ws_path(),
            handshake_delay_ms: default_handshake_delay_ms(),
        }
    }
}

impl SignalingSettings {
    pub fn http_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.http_path)
    }

    pub fn ws_url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.ws_path)
    }

    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }
}

/// Логин/пароль для сообщения connect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub user: String,
    pub password: String,
}

/// Получение TURN учётных данных через API сервиса open relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRelaySettings {
    pub app_name: String,
    pub api_key: String,
}

/// Собственный TURN сервер: на каждого пользователя пара stun: + turn:
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSettings {
    pub public_ip: String,
    #[serde(default = "default_turn_port")]
    pub port: u16,
    #[serde(default)]
    pub users: Vec<UserCredentials>,
}

fn default_turn_port() -> u16 {
    3478
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub signaling: SignalingSettings,
    #[serde(default)]
    pub credentials: Option<UserCredentials>,
    #[serde(default)]
    pub open_relay: Option<OpenRelaySettings>,
    #[serde(default)]
    pub ice_servers: Vec<ServerConfig>,
    #[serde(default)]
    pub turn: Option<TurnSettings>,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signaling.host.trim().is_empty() {
            return Err(ConfigError::invalid("signaling.host", "must not be empty"));
        }
        if self.signaling.port == 0 {
            return Err(ConfigError::invalid("signaling.port", "must be in 1..=65535"));
        }
        for (field, path) in [
            ("signaling.http_path", &self.signaling.http_path),
            ("signaling.ws_path", &self.signaling.ws_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(field, "must start with '/'"));
            }
        }

        if self.signaling.mode == SignalingMode::Websocket && self.credentials.is_none() {
            return Err(ConfigError::invalid(
                "credentials",
                "websocket signaling requires user and password",
            ));
        }

        if let Some(relay) = &self.open_relay {
            if relay.app_name.is_empty() || relay.api_key.is_empty() {
                return Err(ConfigError::invalid(
                    "open_relay",
                    "app_name and api_key are required",
                ));
            }
        }

        // Валидация серверов
        for server in &self.ice_servers {
            if server.url.is_empty() {
                return Err(ConfigError::invalid("ice_servers.url", "must not be empty"));
            }
            if server.r#type == "turn"
                && (server.username.is_none() || server.credential.is_none())
            {
                return Err(ConfigError::invalid(
                    "ice_servers",
                    format!("TURN server {} requires username and credential", server.url),
                ));
            }
        }

        if let Some(turn) = &self.turn {
            if turn.public_ip.is_empty() {
                return Err(ConfigError::invalid("turn.public_ip", "must not be empty"));
            }
            if turn.users.is_empty() {
                return Err(ConfigError::invalid(
                    "turn.users",
                    "at least one user is required",
                ));
            }
        }

        Ok(())
    }
}

/// Загрузка: `{name}.toml|yaml|json` (необязателен), затем SSC__SECTION__KEY
pub fn load_settings(name: &str) -> Result<Settings, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("SSC")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
