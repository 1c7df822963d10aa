use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIトークンが設定されていません。環境変数 ASSISTANT_API_TOKEN を設定してください")]
    MissingApiToken,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("シートが見つかりません: {0}")]
    SheetNotFound(String),

    #[error("列レイアウトが不正: {0}")]
    LayoutMismatch(String),

    #[error("Excel読み込みエラー: {0}")]
    ExcelRead(String),

    #[error("Excel書き込みエラー: {0}")]
    ExcelWrite(String),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Error: {body}")]
    Upstream { status: u16, body: String },

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("タスク実行エラー: {0}")]
    Task(String),

    #[error(transparent)]
    Common(#[from] media_tracker_common::Error),
}

impl From<calamine::XlsxError> for TrackerError {
    fn from(e: calamine::XlsxError) -> Self {
        TrackerError::ExcelRead(e.to_string())
    }
}

impl From<zip::result::ZipError> for TrackerError {
    fn from(e: zip::result::ZipError) -> Self {
        TrackerError::ExcelWrite(e.to_string())
    }
}

impl From<quick_xml::Error> for TrackerError {
    fn from(e: quick_xml::Error) -> Self {
        TrackerError::ExcelWrite(e.to_string())
    }
}

impl From<tokio::task::JoinError> for TrackerError {
    fn from(e: tokio::task::JoinError) -> Self {
        TrackerError::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
