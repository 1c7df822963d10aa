//! リンク先コンテンツの取得
//!
//! - 記事: HTMLを取得して表示テキストを抽出
//! - 画像: バイト列を取得して画像→テキスト用アシスタントへアップロード
//!
//! 失敗は例外にせず Payload::Failed として下流へ流す。

mod article;
mod image;

pub use article::html_to_text;

use crate::config::Config;
use crate::error::Result;
use std::time::Duration;

pub struct Extractor {
    client: reqwest::Client,
}

impl Extractor {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.user_agent, config.fetch_timeout())
    }
}
