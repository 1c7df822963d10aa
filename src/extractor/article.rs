use super::Extractor;
use media_tracker_common::Payload;
use regex::Regex;
use scraper::{Html, Node};
use tracing::{debug, warn};

/// 本文に含めない要素
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

impl Extractor {
    /// 記事ページの表示テキストを取得
    pub async fn scrape_text(&self, url: &str) -> Payload {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "article fetch failed");
                return Payload::Failed(format!("Error: {}", e));
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(url, status = status.as_u16(), "article fetch returned non-200");
            return Payload::Failed(format!(
                "Failed to scrape URL: {} (HTTP {})",
                url,
                status.as_u16()
            ));
        }

        match response.text().await {
            Ok(body) => {
                let text = html_to_text(&body);
                debug!(url, chars = text.len(), "article scraped");
                Payload::Text(text)
            }
            Err(e) => Payload::Failed(format!("Error: {}", e)),
        }
    }
}

/// HTMLから表示テキストを連結して取り出す
pub fn html_to_text(html: &str) -> String {
    lazy_static::lazy_static! {
        static ref BLANK_LINES: Regex = Regex::new(r"\n\s*\n(\s*\n)+").unwrap();
    }

    let document = Html::parse_document(html);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        if let Node::Text(t) = node.value() {
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
            });
            if !hidden {
                text.push_str(t);
            }
        }
    }

    BLANK_LINES.replace_all(text.trim(), "\n\n").to_string()
}
