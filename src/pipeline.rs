//! ハイパーリンク一括処理
//!
//! 入力シートを読み、各リンクを画像/記事に振り分けてアシスタントに問い合わせ、
//! カテゴリ照合の結果を出力シートへ1回で書き込む。

use crate::config::Config;
use crate::dispatcher::{reply_text, AssistantClient};
use crate::error::Result;
use crate::extractor::Extractor;
use crate::reader::read_hyperlinks;
use crate::writer::write_results;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use media_tracker_common::{
    classify, match_payload, CategoryFlags, ClassificationRequest, FailedPayloadPolicy, LinkKind,
    Payload, Taxonomy,
};
use std::sync::Arc;
use tracing::{info, warn};

/// リンク1件からアシスタント応答テキストを得る
#[async_trait]
pub trait ContentPipeline: Send + Sync {
    /// 画像リンク: アップロードして画像説明を得る
    async fn describe_image(&self, url: &str) -> Payload;

    /// 記事リンク: 本文を全アシスタントへ送って統合する
    async fn classify_article(&self, url: &str) -> Payload;
}

/// 抽出器とアシスタントAPIを使う実装
pub struct RemotePipeline {
    extractor: Extractor,
    assistants: Arc<AssistantClient>,
    image_assistant: String,
    failed_payloads: FailedPayloadPolicy,
}

impl RemotePipeline {
    pub fn new(
        extractor: Extractor,
        assistants: Arc<AssistantClient>,
        image_assistant: impl Into<String>,
        failed_payloads: FailedPayloadPolicy,
    ) -> Self {
        Self {
            extractor,
            assistants,
            image_assistant: image_assistant.into(),
            failed_payloads,
        }
    }

    pub fn from_config(config: &Config, assistants: Arc<AssistantClient>) -> Result<Self> {
        Ok(Self::new(
            Extractor::from_config(config)?,
            assistants,
            config.image_assistant.clone(),
            config.failed_payloads,
        ))
    }

    /// 抽出に失敗したとき問い合わせを省略するか
    fn short_circuit(&self, extracted: &Payload) -> bool {
        extracted.is_failed() && self.failed_payloads == FailedPayloadPolicy::Skip
    }
}

#[async_trait]
impl ContentPipeline for RemotePipeline {
    async fn describe_image(&self, url: &str) -> Payload {
        let blob = self
            .extractor
            .process_image_link(url, &self.assistants, &self.image_assistant)
            .await;
        if self.short_circuit(&blob) {
            return blob;
        }

        let request = ClassificationRequest::new(blob.into_text());
        match self.assistants.call_one(&self.image_assistant, &request).await {
            Ok(json) if json.get("message").is_some() => Payload::Text(reply_text(&json)),
            Ok(_) => Payload::Failed("No text found".into()),
            Err(e) => {
                warn!(url, error = %e, "image description failed");
                Payload::Failed(e.to_string())
            }
        }
    }

    async fn classify_article(&self, url: &str) -> Payload {
        let scraped = self.extractor.scrape_text(url).await;
        if self.short_circuit(&scraped) {
            return scraped;
        }

        let request = ClassificationRequest::new(scraped.into_text());
        Payload::Text(self.assistants.dispatch_all(&request).await)
    }
}

/// 一括処理の結果
#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    /// 抽出・問い合わせに失敗した行
    pub failed_rows: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

/// シートのリンクを処理して出力シートへ書き込む
///
/// 行の失敗では止まらない。ワークブックの読み書きに失敗した場合だけエラーを返す。
pub async fn process_hyperlinks<P>(
    config: &Config,
    taxonomy: &Taxonomy,
    pipeline: &P,
    sheet_name: &str,
    progress: &ProgressBar,
) -> Result<ProcessSummary>
where
    P: ContentPipeline + ?Sized,
{
    let started_at = Local::now();
    let workbook = config.excel_file_path.clone();
    config.output.validate(taxonomy.width())?;

    let rows = {
        let path = workbook.clone();
        let sheet = sheet_name.to_string();
        let (header_row, link_col) = (config.input_header_row, config.input_link_column);
        tokio::task::spawn_blocking(move || read_hyperlinks(&path, &sheet, header_row, link_col))
            .await??
    };
    let rows_read = rows.len();
    let links: Vec<String> = rows.into_iter().filter_map(|r| r.raw_link).collect();
    progress.set_length(links.len() as u64);

    let policy = config.failed_payloads;
    let results: Vec<(CategoryFlags, bool)> = stream::iter(links)
        .map(|link| async move {
            info!(link = %link, "processing link");
            let payload = match classify(&link) {
                LinkKind::Image => pipeline.describe_image(&link).await,
                LinkKind::Article => pipeline.classify_article(&link).await,
            };
            if payload.is_failed() {
                warn!(link = %link, reason = %payload, "link produced no content");
            }
            let flags = match_payload(taxonomy, &link, &payload, policy);
            progress.inc(1);
            (flags, payload.is_failed())
        })
        .buffered(config.max_concurrent_rows)
        .collect()
        .await;

    let failed_rows = results.iter().filter(|(_, failed)| *failed).count();
    let flags: Vec<CategoryFlags> = results.into_iter().map(|(f, _)| f).collect();
    let rows_written = flags.len();

    {
        let path = workbook.clone();
        let layout = config.output.clone();
        let taxonomy = taxonomy.clone();
        tokio::task::spawn_blocking(move || write_results(&path, &layout, &taxonomy, &flags))
            .await??;
    }
    progress.finish_and_clear();

    let summary = ProcessSummary {
        rows_read,
        rows_written,
        failed_rows,
        started_at,
        finished_at: Local::now(),
    };
    info!(
        workbook = %workbook.display(),
        sheet = sheet_name,
        rows_read,
        rows_written,
        failed_rows,
        elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
        "hyperlink processing finished"
    );
    Ok(summary)
}
