//! カテゴリ体系
//!
//! 出力列は位置で決まるため順序を保持する。実行中は不変で、
//! Matcher と Writer に明示的に渡す。

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashSet;

/// 元リンクを保持する列の名前
pub const LINK_FIELD: &str = "Article Title & Link";

/// テンプレート（MediaScorecard）の列順
pub const DEFAULT_TAXONOMY: &[&str] = &[
    "Publication", "Article Title & Link", "Date", "Qtr", "Country", "Global Region Reached",
    "Corporate", "AECO", "B2W", "MEP", "SketchUp Visualization", "SketchUp Collaboration",
    "Structures", "Viewpoint", "Industry Cloud/TC1", "Civil Design & Engineering",
    "Civil Construction (CIS)", "O&PS", "FIELD SYSTEMS", "Civil", "Geospatial / BCFS",
    "Applanix", "OEM GNSS", "TAP / Auto IoT", "Paving / Milling", "Marine", "Drilling / Piling",
    "Earthmoving / Machine Control", "Surveying (human / drone / machine)",
    "Bidding / Estimating / Takeoff", "Jobsite connectivity / F2O", "Safety",
    "Asset capture and inspection", "Monitoring", "Reality capture",
    "BIM / Model-based workflows", "Mixed reality", "Crash & Crime",
    "Field Systems Themes", "TRANSPORTATION & LOG.", "Forestry", "Mobility",
    "Transporeon", "MAPS", "Rail", "Thought Leadership / Byline", "Journalist Feature",
    "Customer Focus", "Award", "Podcast", "News release pickup", "Mention", "GREAT ONE",
    "Trimble in video", "Trimble quote", "Trimble image", "Trimble title mention",
    "T1: Business / Finance", "T1: Dailies", "T1: TV/Radio", "T1: Technology", "T1: Industry",
    "T2: Dailies, Business, Regional", "T2: Trade", "T2: Technology", "T2: Industry (adjacent)",
    "AI/ML", "Infrastructure", "Trimble revenue / business growth",
    "Digital 2 Physical / Ph2Dig", "Connected Ecosystems", "Sustainability",
    "Trust & Security", "Workforce Optimization", "Innovation",
];

#[derive(Debug, Clone)]
struct Category {
    name: String,
    /// リンク列は照合しないため None
    pattern: Option<Regex>,
}

/// 順序付きカテゴリ一覧
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Vec<Category>,
    link_position: usize,
}

impl Taxonomy {
    /// カテゴリ名一覧から作成
    ///
    /// 空・空白のみ・重複はエラー。`LINK_FIELD` を含まない場合は末尾に追加する。
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for name in names {
            let name: String = name.into();
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidTaxonomy("空のカテゴリ名があります".into()));
            }
            if !seen.insert(trimmed.to_lowercase()) {
                return Err(Error::InvalidTaxonomy(format!("カテゴリが重複しています: {}", trimmed)));
            }

            let pattern = if trimmed == LINK_FIELD {
                None
            } else {
                Some(build_pattern(trimmed)?)
            };
            categories.push(Category {
                name: trimmed.to_string(),
                pattern,
            });
        }

        if categories.iter().all(|c| c.pattern.is_none()) {
            return Err(Error::InvalidTaxonomy("カテゴリがありません".into()));
        }

        let link_position = match categories.iter().position(|c| c.pattern.is_none()) {
            Some(pos) => pos,
            None => {
                categories.push(Category {
                    name: LINK_FIELD.to_string(),
                    pattern: None,
                });
                categories.len() - 1
            }
        };

        Ok(Self { categories, link_position })
    }

    /// テンプレート標準のカテゴリ体系
    pub fn media_default() -> Result<Self> {
        Self::new(DEFAULT_TAXONOMY.iter().copied())
    }

    /// JSON配列（文字列のリスト）から作成
    pub fn from_json(json: &str) -> Result<Self> {
        let names: Vec<String> = serde_json::from_str(json)?;
        Self::new(names)
    }

    /// 出力行の列数（リンク列を含む）
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// リンク列の位置（0始まり）
    pub fn link_position(&self) -> usize {
        self.link_position
    }

    /// ヘッダー行
    pub fn header(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    /// 照合対象のカテゴリ名（リンク列を除く、列順）
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .filter(|c| c.pattern.is_some())
            .map(|c| c.name.as_str())
    }

    pub(crate) fn patterns(&self) -> impl Iterator<Item = (&str, &Regex)> {
        self.categories
            .iter()
            .filter_map(|c| c.pattern.as_ref().map(|p| (c.name.as_str(), p)))
    }
}

/// 大文字小文字を区別しない単語単位のパターン
///
/// 語間の空白は任意の空白の連続に一致させる。
fn build_pattern(name: &str) -> Result<Regex> {
    let body = name
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    Ok(Regex::new(&format!(r"(?i)\b{}\b", body))?)
}
