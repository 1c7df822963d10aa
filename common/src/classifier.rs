//! リンク種別判定
//!
//! URL文字列だけで画像か記事かを決める。内容は見ない。

use serde::{Deserialize, Serialize};

/// 画像とみなすURL中のキーワード（小文字）
const IMAGE_MARKERS: &[&str] = &["qg", "digital"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Image,
    Article,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Image => "image",
            LinkKind::Article => "article",
        }
    }
}

/// URLを画像/記事に分類
pub fn classify(url: &str) -> LinkKind {
    if is_image_url(url) {
        LinkKind::Image
    } else {
        LinkKind::Article
    }
}

pub fn is_image_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    IMAGE_MARKERS.iter().any(|m| lower.contains(m))
}
