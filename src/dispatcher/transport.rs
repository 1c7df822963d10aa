//! アシスタントAPIへの送信路
//!
//! リトライ処理をHTTPから切り離すためのトレイト

use async_trait::async_trait;
use media_tracker_common::ClassificationRequest;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// JSONをPOSTしてデコード済みの応答を返す
#[async_trait]
pub trait AssistantTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        request: &ClassificationRequest,
    ) -> Result<Value, TransportError>;
}

/// reqwest による実装（Bearer認証付き）
pub struct HttpTransport {
    client: reqwest::Client,
    token: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
        }
    }
}

#[async_trait]
impl AssistantTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        request: &ClassificationRequest,
    ) -> Result<Value, TransportError> {
        debug!(url, len = request.message.len(), "assistant request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            // ステータスに関わらず本文をデコードして返す
            warn!(url, status = status.as_u16(), "assistant returned non-success status");
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Decode(e.to_string())
            }
        })
    }
}

fn from_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e.to_string())
    }
}
