//! 既存ワークブックへの結果書き込み
//!
//! xlsx パッケージのうち出力シートのXMLだけを書き換え、他の部品は
//! そのまま写す。出力シートではクリア範囲と今回の書き込み範囲の値を消してから
//! 結果を書く。同じディレクトリの一時ファイルに保存してから元のパスへ置き換える。

mod package;
mod sheet;

use crate::error::{Result, TrackerError};
use media_tracker_common::{CategoryFlags, Taxonomy};
use serde::{Deserialize, Serialize};
use sheet::CellValues;
use std::fs::File;
use std::io::{Cursor, Write};
use std::ops::{Range, RangeInclusive};
use std::path::Path;
use tracing::info;
use zip::ZipArchive;

/// 出力先の位置（行・列は1始まり）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLayout {
    pub sheet: String,
    /// ヘッダー行。ここから下を書き換える
    pub header_row: u32,
    /// 出力行の先頭列
    pub origin_col: u16,
    /// 空にする列範囲
    pub clear_first_col: u16,
    pub clear_last_col: u16,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            sheet: "MediaScorecard".into(),
            header_row: 5,
            origin_col: 1,
            clear_first_col: 13,
            clear_last_col: 75,
        }
    }
}

impl OutputLayout {
    /// 出力列数に対して範囲が成り立つか確認
    pub fn validate(&self, width: usize) -> Result<()> {
        if self.header_row == 0 || self.origin_col == 0 || self.clear_first_col == 0 {
            return Err(TrackerError::LayoutMismatch("行・列は1始まりです".into()));
        }
        if self.clear_first_col > self.clear_last_col {
            return Err(TrackerError::LayoutMismatch(format!(
                "列範囲が逆転しています: {}..{}",
                self.clear_first_col, self.clear_last_col
            )));
        }
        let last_written = usize::from(self.origin_col) + width.saturating_sub(1);
        if last_written > usize::from(self.clear_last_col) {
            return Err(TrackerError::LayoutMismatch(format!(
                "{}列の出力が{}列目を超えます（開始{}列目）",
                width, self.clear_last_col, self.origin_col
            )));
        }
        Ok(())
    }

    /// ヘッダーと結果行が占める範囲（0始まり）
    fn block(&self, width: usize, rows: usize) -> Result<Block> {
        let first_row = self.header_row - 1;
        let first_col = u32::from(self.origin_col - 1);
        Ok(Block {
            rows: first_row..=first_row + to_u32(rows)?,
            cols: first_col..first_col + to_u32(width)?,
        })
    }

    /// 0始まりの位置がクリア対象か
    fn is_cleared(&self, row: u32, col: u32) -> bool {
        row + 1 >= self.header_row
            && col + 1 >= u32::from(self.clear_first_col)
            && col < u32::from(self.clear_last_col)
    }
}

/// 今回書き込む範囲。書かない空セルも前回の値を消す
struct Block {
    rows: RangeInclusive<u32>,
    cols: Range<u32>,
}

impl Block {
    fn contains(&self, row: u32, col: u32) -> bool {
        self.rows.contains(&row) && self.cols.contains(&col)
    }
}

/// 結果を既存ワークブックへ書き込んで同じパスに保存
pub fn write_results(
    path: &Path,
    layout: &OutputLayout,
    taxonomy: &Taxonomy,
    rows: &[CategoryFlags],
) -> Result<()> {
    if !path.exists() {
        return Err(TrackerError::FileNotFound(path.display().to_string()));
    }
    layout.validate(taxonomy.width())?;

    let mut archive = ZipArchive::new(File::open(path)?)?;
    let part = package::worksheet_part(&mut archive, &layout.sheet)?
        .ok_or_else(|| TrackerError::SheetNotFound(layout.sheet.clone()))?;
    let xml = package::read_part(&mut archive, &part)?;

    let block = layout.block(taxonomy.width(), rows.len())?;
    let patched = sheet::patch_sheet(
        &xml,
        |row, col| layout.is_cleared(row, col) || block.contains(row, col),
        cell_values(layout, taxonomy, rows)?,
    )?;

    let buffer = package::replace_part(&mut archive, &part, patched.as_bytes(), Cursor::new(Vec::new()))?;
    let buffer = buffer.into_inner();
    drop(archive);
    replace_file(path, &buffer)?;

    info!(
        path = %path.display(),
        sheet = %layout.sheet,
        part = %part,
        rows = rows.len(),
        "results written"
    );
    Ok(())
}

/// ヘッダー行と結果行の書き込む値。空文字は空セル
fn cell_values(layout: &OutputLayout, taxonomy: &Taxonomy, rows: &[CategoryFlags]) -> Result<CellValues> {
    let first_row = layout.header_row - 1;
    let first_col = u32::from(layout.origin_col - 1);

    let lines = std::iter::once(taxonomy.header()).chain(rows.iter().map(|flags| flags.cells()));
    let mut values = CellValues::new();
    for (offset, line) in lines.enumerate() {
        let row = first_row + to_u32(offset)?;
        let cells = values.entry(row).or_default();
        for (col_offset, value) in line.iter().enumerate() {
            if !value.is_empty() {
                cells.insert(first_col + to_u32(col_offset)?, value.to_string());
            }
        }
    }
    Ok(values)
}

/// 一時ファイル経由で置き換え
fn replace_file(path: &Path, buffer: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(buffer)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| TrackerError::Io(e.error))?;
    Ok(())
}

fn to_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| TrackerError::LayoutMismatch(format!("行番号が大きすぎます: {}", n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_fits_default_taxonomy() {
        let taxonomy = Taxonomy::media_default().unwrap();
        assert!(OutputLayout::default().validate(taxonomy.width()).is_ok());
    }

    #[test]
    fn test_too_wide_is_layout_mismatch() {
        let layout = OutputLayout {
            origin_col: 13,
            ..OutputLayout::default()
        };
        let result = layout.validate(75);
        assert!(matches!(result, Err(TrackerError::LayoutMismatch(_))));
    }

    #[test]
    fn test_inverted_range_is_layout_mismatch() {
        let layout = OutputLayout {
            clear_first_col: 80,
            ..OutputLayout::default()
        };
        assert!(matches!(layout.validate(3), Err(TrackerError::LayoutMismatch(_))));
    }

    #[test]
    fn test_cleared_region() {
        let layout = OutputLayout::default();
        // 0始まり: 行4 = 5行目、列12 = 13列目
        assert!(layout.is_cleared(4, 12));
        assert!(layout.is_cleared(100, 74));
        assert!(!layout.is_cleared(3, 12));
        assert!(!layout.is_cleared(4, 11));
        assert!(!layout.is_cleared(4, 75));
    }

    #[test]
    fn test_block_covers_header_and_rows() {
        let block = OutputLayout::default().block(3, 2).unwrap();
        // ヘッダー5行目と結果2行、A..C列
        assert!(block.contains(4, 0));
        assert!(block.contains(6, 2));
        assert!(!block.contains(7, 0));
        assert!(!block.contains(3, 0));
        assert!(!block.contains(5, 3));
    }

    #[test]
    fn test_cell_values_skip_blanks() {
        let taxonomy = Taxonomy::new(["Construction", "Surveying"]).unwrap();
        let rows = vec![media_tracker_common::match_categories(
            &taxonomy,
            "http://a",
            "Surveying",
        )];
        let values = cell_values(&OutputLayout::default(), &taxonomy, &rows).unwrap();

        assert_eq!(values[&4].len(), 3);
        let row = &values[&5];
        assert_eq!(row.get(&0), None);
        assert_eq!(row.get(&1).map(String::as_str), Some("X"));
        assert_eq!(row.get(&2).map(String::as_str), Some("http://a"));
    }
}
