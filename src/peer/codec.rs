use base64::{engine::general_purpose, Engine as _};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::DecodeError;

/// Кодирование для передачи по сигнальному каналу: JSON -> base64
pub fn encode<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(general_purpose::STANDARD.encode(json))
}

/// Обратное преобразование: base64 -> JSON -> T
pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T, DecodeError> {
    let json = general_purpose::STANDARD.decode(token.trim())?;
    Ok(serde_json::from_slice(&json)?)
}
