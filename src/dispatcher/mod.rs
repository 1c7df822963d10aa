//! アシスタントAPI連携
//!
//! - call_assistant: リトライ付きで1件呼び出し（失敗は文字列化）
//! - dispatch_all: 登録済みアシスタント全件へ同時送信して統合
//! - call_one: 1件をリトライなしで呼び出し、JSONをそのまま返す
//! - upload_image: 画像をアップロードして blob URL を得る

mod retry;
mod transport;

pub use retry::{call_assistant, reply_text, RetryPolicy, TIMEOUT_SENTINEL};
pub use transport::{AssistantTransport, HttpTransport, TransportError};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use futures::future::join_all;
use media_tracker_common::{AssistantReply, ClassificationRequest, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// ファンアウト先のアシスタント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantEntry {
    /// 統合テキストの行頭に付く名前
    pub label: String,
    pub id: String,
}

impl AssistantEntry {
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: id.into(),
        }
    }

    pub fn default_registry() -> Vec<Self> {
        vec![
            Self::new("Content-type", "trimble-media-content-type"),
            Self::new("Corporate", "trimble-media-corporate"),
            Self::new("Media-types", "trimble-media-media-types"),
            Self::new("Field-systems", "trimble-media-field-systems"),
            Self::new("aeco", "trimble-media-coverage-aeco"),
        ]
    }
}

/// アップロードする画像
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// 画像アップロードの結果
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// アシスタントの応答JSON（`blob_url` を含む）
    Uploaded(Value),
    Rejected { status: u16, message: String },
}

impl UploadOutcome {
    pub fn blob_url(&self) -> Option<&str> {
        match self {
            UploadOutcome::Uploaded(json) => json.get("blob_url").and_then(Value::as_str),
            UploadOutcome::Rejected { .. } => None,
        }
    }
}

pub struct AssistantClient {
    base_url: String,
    registry: Vec<AssistantEntry>,
    policy: RetryPolicy,
    http: reqwest::Client,
    token: String,
    transport: Arc<dyn AssistantTransport>,
}

impl AssistantClient {
    /// 設定と環境変数のトークンから作成
    pub fn new(config: &Config) -> Result<Self> {
        let token = config.api_token()?;
        Self::with_token(config, token)
    }

    pub fn with_token(config: &Config, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let http = reqwest::Client::builder().build()?;
        let transport = Arc::new(HttpTransport::new(http.clone(), token.clone()));

        Ok(Self {
            base_url: config.assistant_base_url.trim_end_matches('/').to_string(),
            registry: config.assistants.clone(),
            policy: config.retry_policy(),
            http,
            token,
            transport,
        })
    }

    /// 送信路を差し替える（ファンアウトのみ影響）
    pub fn with_transport(mut self, transport: Arc<dyn AssistantTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn registry(&self) -> &[AssistantEntry] {
        &self.registry
    }

    pub fn messages_url(&self, assistant_id: &str) -> String {
        format!("{}/agents/{}/messages", self.base_url, assistant_id)
    }

    pub fn images_url(&self, assistant_id: &str, session_id: &str) -> String {
        format!(
            "{}/agents/{}/sessions/{}/images",
            self.base_url, assistant_id, session_id
        )
    }

    /// リトライ付き呼び出し
    pub async fn call_assistant(&self, url: &str, request: &ClassificationRequest) -> Payload {
        call_assistant(self.transport.as_ref(), url, request, &self.policy).await
    }

    /// 全アシスタントへ同時送信（登録順で返す）
    pub async fn dispatch_replies(&self, request: &ClassificationRequest) -> Vec<AssistantReply> {
        let calls = self.registry.iter().map(|entry| {
            let url = self.messages_url(&entry.id);
            async move {
                let payload = self.call_assistant(&url, request).await;
                AssistantReply {
                    source_id: entry.label.clone(),
                    text: payload.into_text(),
                }
            }
        });

        join_all(calls).await
    }

    /// 全アシスタントの応答を1つのテキストに統合
    pub async fn dispatch_all(&self, request: &ClassificationRequest) -> String {
        consolidate(&self.dispatch_replies(request).await)
    }

    /// 1件へリトライなしで送信し、JSONをそのまま返す
    pub async fn call_one(&self, assistant_id: &str, request: &ClassificationRequest) -> Result<Value> {
        let url = self.messages_url(assistant_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(assistant_id, status = status.as_u16(), "assistant rejected message");
            return Err(TrackerError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }

    /// 画像をセッションへアップロード
    pub async fn upload_image(
        &self,
        assistant_id: &str,
        session_id: &str,
        file: ImageUpload,
    ) -> Result<UploadOutcome> {
        let url = self.images_url(assistant_id, session_id);

        let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(assistant_id, session_id, status = status.as_u16(), "image upload rejected");
            return Ok(UploadOutcome::Rejected {
                status: status.as_u16(),
                message: format!("Upload failed with status code {}", status.as_u16()),
            });
        }

        let json = response.json::<Value>().await?;
        info!(assistant_id, session_id, "image uploaded");
        Ok(UploadOutcome::Uploaded(json))
    }
}

/// `label: text` を1行ずつ連結
pub fn consolidate(replies: &[AssistantReply]) -> String {
    replies
        .iter()
        .map(AssistantReply::line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// アシスタントごとに応答までの時間を変える送信路
    struct Staggered;

    #[async_trait]
    impl AssistantTransport for Staggered {
        async fn post_json(&self, url: &str, _: &ClassificationRequest) -> std::result::Result<Value, TransportError> {
            // 3番目が最初、1番目が最後に返る
            let (delay, name) = if url.contains("content-type") {
                (500, "one")
            } else if url.contains("corporate") {
                (300, "two")
            } else if url.contains("media-types") {
                (10, "three")
            } else if url.contains("field-systems") {
                (100, "four")
            } else {
                (200, "five")
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(json!({ "message": name }))
        }
    }

    fn client() -> AssistantClient {
        AssistantClient::with_token(&Config::default(), "test-token")
            .unwrap()
            .with_transport(Arc::new(Staggered))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_keeps_registry_order() {
        let consolidated = client().dispatch_all(&ClassificationRequest::new("Hello World")).await;
        assert_eq!(
            consolidated,
            "Content-type: one\nCorporate: two\nMedia-types: three\nField-systems: four\naeco: five"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_runs_concurrently() {
        let start = tokio::time::Instant::now();
        let replies = client().dispatch_replies(&ClassificationRequest::new("x")).await;
        assert_eq!(replies.len(), 5);
        // 最も遅い1件分で終わる
        assert!(start.elapsed() < Duration::from_millis(600));
    }

    #[test]
    fn test_urls() {
        let mut config = Config::default();
        config.assistant_base_url = "http://localhost:9000/v1/".into();
        let client = AssistantClient::with_token(&config, "t").unwrap();
        assert_eq!(client.messages_url("abc"), "http://localhost:9000/v1/agents/abc/messages");
        assert_eq!(
            client.images_url("img", "s1"),
            "http://localhost:9000/v1/agents/img/sessions/s1/images"
        );
    }

    #[test]
    fn test_blob_url() {
        let uploaded = UploadOutcome::Uploaded(json!({"blob_url": "http://example.com/blob/12345"}));
        assert_eq!(uploaded.blob_url(), Some("http://example.com/blob/12345"));
        let rejected = UploadOutcome::Rejected { status: 500, message: "x".into() };
        assert_eq!(rejected.blob_url(), None);
    }
}
