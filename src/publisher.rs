//! Publisher - emits one piece of content to the outbound channel
//!
//! The scheduler only needs "publish this text, tell me where it went".
//! `WebhookPublisher` covers that with a plain JSON POST:
//!
//! ```text
//! POST {PUBLISH_WEBHOOK_URL}
//! { "text": "..." }
//!
//! 200 OK
//! { "id": "1890...", "url": "https://..." }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Publish rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid publish response: {0}")]
    InvalidResponse(String),
}

/// Where a published item ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub external_id: String,
    pub url: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishError>;
}

#[derive(Serialize)]
struct WebhookRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
}

impl WebhookResponse {
    fn into_receipt(self) -> Result<PublishReceipt, PublishError> {
        let external_id = match self.id {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(PublishError::InvalidResponse(format!("unexpected id: {}", other)))
            }
            None => return Err(PublishError::InvalidResponse("missing id".to_string())),
        };
        Ok(PublishReceipt {
            external_id,
            url: self.url.unwrap_or_default(),
        })
    }
}

/// Publisher that POSTs JSON to a configured webhook URL
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WebhookResponse = response
            .json()
            .await
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;

        parsed.into_receipt()
    }
}
