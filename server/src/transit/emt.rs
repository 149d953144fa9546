use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::types::EmtArrivalResponse;
use crate::config::Config;

#[derive(Error, Debug)]
pub enum EmtError {
    #[error("EMT request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("EMT returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid EMT response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct EmtClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl EmtClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("SignageServer/1.0")
            .timeout(Duration::from_secs(config.emt_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.emt_base_url.trim_end_matches('/').to_string(),
            access_token: config.emt_access_token.clone(),
        })
    }

    pub async fn get_arrival_bus(
        &self,
        stop_id: &str,
        line: &str,
    ) -> Result<EmtArrivalResponse, EmtError> {
        let url = format!(
            "{}/v2/transport/busemtmad/stops/{}/arrives/{}/",
            self.base_url, stop_id, line
        );
        let body = serde_json::json!({
            "cultureInfo": "ES",
            "Text_StopRequired_YN": "N",
            "Text_EstimationsRequired_YN": "Y",
            "Text_IncidencesRequired_YN": "N",
            "DateTime_Referenced_Incidencies_YYYYMMDD": Utc::now().format("%Y%m%d").to_string(),
        });

        let response = self
            .client
            .post(&url)
            .header("accessToken", &self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmtError::Status { status: status.as_u16(), body });
        }

        let json: Value = response.json().await?;
        tracing::debug!(stop = stop_id, line, code = ?json.get("code"), "EMT arrivals received");
        Ok(serde_json::from_value(json)?)
    }
}
