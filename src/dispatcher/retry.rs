//! タイムアウト付きリトライ
//!
//! 呼び出し元には決してエラーを返さず、失敗は Payload::Failed にする。

use super::transport::{AssistantTransport, TransportError};
use media_tracker_common::{ClassificationRequest, Payload};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

pub const TIMEOUT_SENTINEL: &str = "Error: Assistant request timed out.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 1回あたりのタイムアウト
    pub timeout: Duration,
    /// タイムアウト後の待機
    pub backoff: Duration,
    /// 初回を含む試行回数
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            backoff: Duration::from_secs(2),
            max_attempts: 3,
        }
    }
}

/// アシスタントを呼び出して応答テキストを得る
///
/// タイムアウト時のみ `backoff` 待ってリトライし、使い切ったら
/// `TIMEOUT_SENTINEL` を返す。その他のエラーは即座に失敗文字列にする。
pub async fn call_assistant<T>(
    transport: &T,
    url: &str,
    request: &ClassificationRequest,
    policy: &RetryPolicy,
) -> Payload
where
    T: AssistantTransport + ?Sized,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(policy.timeout, transport.post_json(url, request)).await;

        match outcome {
            Ok(Ok(json)) => return Payload::Text(reply_text(&json)),
            Ok(Err(TransportError::Timeout)) | Err(_) => {
                if attempt < attempts {
                    warn!(url, attempt, max = attempts, "assistant timed out, retrying");
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Ok(Err(e)) => {
                warn!(url, error = %e, "assistant call failed");
                return Payload::Failed(format!("Unexpected error: {}", e));
            }
        }
    }

    warn!(url, attempts, "assistant timed out on every attempt");
    Payload::Failed(TIMEOUT_SENTINEL.to_string())
}

/// `message` フィールド、なければ応答全体をJSON文字列化
pub fn reply_text(json: &Value) -> String {
    match json.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => json.to_string(),
    }
}
