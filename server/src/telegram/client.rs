use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::types::{ApiResponse, File};
use super::TelegramError;

const REQUEST_TIMEOUT_SECS: u64 = 20;

#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;
    /// Resolves a file id into a download path.
    async fn get_file(&self, file_id: &str) -> Result<String, TelegramError>;
    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TelegramError>;
    /// Raw updates; decoding is left to the caller so one bad update does
    /// not drop the batch.
    async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
        allowed_updates: &[String],
    ) -> Result<Vec<Value>, TelegramError>;
}

pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("SignageServer/1.0")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: Value) -> Result<T, TelegramError> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        let body: ApiResponse<T> = response.json().await?;
        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api(format!(
                "{method} failed with HTTP {status}: {}",
                body.description.unwrap_or_default()
            ))),
        }
    }
}

#[async_trait]
impl TelegramApi for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: Value = self
            .call("sendMessage", serde_json::json!({"chat_id": chat_id, "text": text}))
            .await?;
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> Result<String, TelegramError> {
        let file: File = self
            .call("getFile", serde_json::json!({"file_id": file_id}))
            .await?;
        file.file_path
            .ok_or_else(|| TelegramError::Api(format!("no file_path for {}", file.file_id)))
    }

    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TelegramError> {
        let url = format!("{}/file/bot{}/{}", self.base_url, self.token, file_path);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
        allowed_updates: &[String],
    ) -> Result<Vec<Value>, TelegramError> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": allowed_updates,
            }),
        )
        .await
    }
}
