//! カテゴリ照合
//!
//! アシスタント応答テキストからカテゴリ名を単語単位で探し、
//! 見つかったカテゴリに "X" を付ける。

use crate::taxonomy::{Taxonomy, LINK_FIELD};
use crate::types::Payload;
use serde::{Deserialize, Serialize};

/// セルに書く印
pub const MARK_SET: &str = "X";
pub const MARK_UNSET: &str = "";

/// カテゴリ1件分の判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMark {
    pub category: String,
    pub set: bool,
}

/// 1行分の照合結果（カテゴリ体系と同じ列順）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFlags {
    pub link: String,
    marks: Vec<CategoryMark>,
    link_position: usize,
}

impl CategoryFlags {
    /// 全カテゴリ未設定の行
    pub fn unset(taxonomy: &Taxonomy, link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            marks: taxonomy
                .category_names()
                .map(|name| CategoryMark {
                    category: name.to_string(),
                    set: false,
                })
                .collect(),
            link_position: taxonomy.link_position(),
        }
    }

    pub fn marks(&self) -> &[CategoryMark] {
        &self.marks
    }

    /// 列名に対応するセル値（未知の列は None）
    pub fn get(&self, name: &str) -> Option<&str> {
        if name == LINK_FIELD {
            return Some(&self.link);
        }
        self.marks
            .iter()
            .find(|m| m.category == name)
            .map(|m| if m.set { MARK_SET } else { MARK_UNSET })
    }

    /// 設定されたカテゴリ名
    pub fn set_categories(&self) -> impl Iterator<Item = &str> {
        self.marks.iter().filter(|m| m.set).map(|m| m.category.as_str())
    }

    /// 出力行（ヘッダーと同じ位置にリンクを挿入）
    pub fn cells(&self) -> Vec<&str> {
        let mut cells: Vec<&str> = self
            .marks
            .iter()
            .map(|m| if m.set { MARK_SET } else { MARK_UNSET })
            .collect();
        cells.insert(self.link_position.min(cells.len()), &self.link);
        cells
    }
}

/// 失敗ペイロードを照合するかどうか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedPayloadPolicy {
    /// 失敗理由のテキストもそのまま照合する
    #[default]
    Attempt,
    /// 全カテゴリ未設定にする
    Skip,
}

/// テキスト中に現れるカテゴリを判定
pub fn match_categories(taxonomy: &Taxonomy, link: &str, text: &str) -> CategoryFlags {
    let mut flags = CategoryFlags::unset(taxonomy, link);
    for (mark, (_, pattern)) in flags.marks.iter_mut().zip(taxonomy.patterns()) {
        mark.set = pattern.is_match(text);
    }
    flags
}

/// ペイロードを照合（失敗時の扱いはポリシーで決める）
pub fn match_payload(
    taxonomy: &Taxonomy,
    link: &str,
    payload: &Payload,
    policy: FailedPayloadPolicy,
) -> CategoryFlags {
    match (payload, policy) {
        (Payload::Failed(_), FailedPayloadPolicy::Skip) => CategoryFlags::unset(taxonomy, link),
        _ => match_categories(taxonomy, link, payload.text()),
    }
}
