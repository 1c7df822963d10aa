//! パイプラインの型定義
//!
//! - LinkRow: 入力シートの1行
//! - ClassificationRequest: アシスタントへ送るメッセージ
//! - AssistantReply: アシスタント1件分の応答
//! - Payload: 成功テキスト / 失敗理由のタグ付き値

use serde::{Deserialize, Serialize};
use std::fmt;

/// 入力シートの1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRow {
    /// ヘッダー行直下を0とするデータ行の序数
    pub row_index: usize,
    pub raw_link: Option<String>,
}

/// アシスタントへのメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub message: String,
    #[serde(default)]
    pub stream: bool,
}

impl ClassificationRequest {
    /// ストリーミングなしのリクエストを作成
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stream: false,
        }
    }
}

/// ファンアウト時のアシスタント応答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub source_id: String,
    pub text: String,
}

impl AssistantReply {
    /// 統合テキストの1行（`label: text`）
    pub fn line(&self) -> String {
        format!("{}: {}", self.source_id, self.text)
    }
}

/// 抽出・問い合わせ結果
///
/// 失敗しても行の処理は止めず、理由の文字列をそのまま下流へ流す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Failed(String),
}

impl Payload {
    /// 成功・失敗に関わらず保持している文字列
    pub fn text(&self) -> &str {
        match self {
            Payload::Text(s) | Payload::Failed(s) => s,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Payload::Text(s) | Payload::Failed(s) => s,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Payload::Failed(_))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
