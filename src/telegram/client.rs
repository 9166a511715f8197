use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::telegram::types::{ReplyKeyboardMarkup, Update};

/// Client for the Telegram Bot HTTP API.
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Parse(String),
    /// Another process is long-polling the same bot token.
    #[error("polling conflict: another instance holds this token")]
    Conflict,
    #[error("telegram api error {code}: {description}")]
    Api { code: i64, description: String },
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://api.telegram.org/bot{}", token),
        }
    }

    /// Send a plain text message. Delivery failures are logged, never fatal.
    pub async fn send_message(&self, chat_id: i64, text: &str) {
        let payload = json!({ "chat_id": chat_id, "text": text });
        if let Err(e) = self.call::<serde_json::Value>("sendMessage", &payload).await {
            error!("Failed to send message: {}", e);
        }
    }

    /// Send a message with a reply keyboard attached.
    pub async fn send_keyboard(&self, chat_id: i64, text: &str, keyboard: &ReplyKeyboardMarkup) {
        let payload = json!({ "chat_id": chat_id, "text": text, "reply_markup": keyboard });
        if let Err(e) = self.call::<serde_json::Value>("sendMessage", &payload).await {
            error!("Failed to send keyboard: {}", e);
        }
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let payload = json!({ "offset": offset, "timeout": timeout_secs });
        self.call("getUpdates", &payload).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T, TelegramError> {
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| TelegramError::Network(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TelegramError::Parse(e.to_string()))?;

        if body.ok {
            return body
                .result
                .ok_or_else(|| TelegramError::Parse("ok response without result".to_string()));
        }

        let code = body.error_code.unwrap_or_else(|| status.as_u16() as i64);
        if code == 409 {
            return Err(TelegramError::Conflict);
        }
        Err(TelegramError::Api {
            code,
            description: body.description.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_deserializes_error() {
        let body: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok": false, "error_code": 409, "description": "Conflict: terminated by other getUpdates request"}"#,
        )
        .unwrap();
        assert!(!body.ok);
        assert_eq!(body.error_code, Some(409));
    }

    #[test]
    fn test_api_response_deserializes_updates() {
        let body: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok": true, "result": [{"update_id": 7, "message": {"chat": {"id": 5}, "text": "/help"}}]}"#,
        )
        .unwrap();
        assert!(body.ok);
        assert_eq!(body.result.unwrap().len(), 1);
    }
}
