use crate::dispatcher::{AssistantEntry, RetryPolicy};
use crate::error::{Result, TrackerError};
use crate::writer::OutputLayout;
use media_tracker_common::{FailedPayloadPolicy, Taxonomy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// APIトークンを読む環境変数
pub const API_TOKEN_ENV: &str = "ASSISTANT_API_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assistant_base_url: String,
    /// ファンアウト先（この順で統合テキストに並ぶ）
    pub assistants: Vec<AssistantEntry>,
    pub image_assistant: String,

    pub call_timeout_seconds: u64,
    pub retry_backoff_seconds: u64,
    pub max_attempts: u32,
    /// 同時に処理する行数の上限
    pub max_concurrent_rows: usize,
    /// 記事・画像取得のタイムアウト（未設定なら無制限）
    pub fetch_timeout_seconds: Option<u64>,
    pub user_agent: String,

    pub excel_file_path: PathBuf,
    pub input_header_row: u32,
    pub input_link_column: u16,
    pub output: OutputLayout,
    pub taxonomy_path: Option<PathBuf>,
    pub failed_payloads: FailedPayloadPolicy,

    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    /// 画像中継で受け付けるリクエスト本文の上限
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assistant_base_url:
                "https://agw.construction-integration.trimble.cloud/trimbledeveloperprogram/assistants/v1"
                    .into(),
            assistants: AssistantEntry::default_registry(),
            image_assistant: "trimble-media-image-2-text".into(),
            call_timeout_seconds: 30,
            retry_backoff_seconds: 2,
            max_attempts: 3,
            max_concurrent_rows: 16,
            fetch_timeout_seconds: None,
            user_agent: "Mozilla/5.0".into(),
            excel_file_path: PathBuf::from("Trimble_Media_Coverage_Tracker.xlsx"),
            input_header_row: 1,
            input_link_column: 2,
            output: OutputLayout::default(),
            taxonomy_path: None,
            failed_payloads: FailedPayloadPolicy::Attempt,
            bind_addr: "127.0.0.1:8002".into(),
            cors_origins: vec!["http://localhost:3000".into()],
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書き
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else if path.is_some() {
            return Err(TrackerError::FileNotFound(config_path.display().to_string()));
        } else {
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| TrackerError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("media-tracker").join("config.json"))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ASSISTANT_BASE_URL") {
            self.assistant_base_url = url;
        }
        if let Ok(path) = std::env::var("EXCEL_FILE_PATH") {
            self.excel_file_path = PathBuf::from(path);
        }
        if let Ok(addr) = std::env::var("MEDIA_TRACKER_BIND") {
            self.bind_addr = addr;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.assistants.is_empty() {
            return Err(TrackerError::Config("アシスタントが登録されていません".into()));
        }
        if self.max_attempts == 0 {
            return Err(TrackerError::Config("max_attempts は1以上にしてください".into()));
        }
        if self.max_concurrent_rows == 0 {
            return Err(TrackerError::Config("max_concurrent_rows は1以上にしてください".into()));
        }
        if self.input_link_column == 0 {
            return Err(TrackerError::Config("input_link_column は1始まりです".into()));
        }
        Ok(())
    }

    /// APIトークン（環境変数のみ）
    pub fn api_token(&self) -> Result<String> {
        match std::env::var(API_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(TrackerError::MissingApiToken),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.call_timeout_seconds),
            backoff: Duration::from_secs(self.retry_backoff_seconds),
            max_attempts: self.max_attempts,
        }
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_seconds.map(Duration::from_secs)
    }

    /// カテゴリ体系を読み込み（未指定ならテンプレート標準）
    pub fn load_taxonomy(&self) -> Result<Taxonomy> {
        match &self.taxonomy_path {
            Some(path) => {
                if !path.exists() {
                    return Err(TrackerError::FileNotFound(path.display().to_string()));
                }
                let content = std::fs::read_to_string(path)?;
                Ok(Taxonomy::from_json(&content)?)
            }
            None => Ok(Taxonomy::media_default()?),
        }
    }
}
