//! 入力シートからリンクを読み込む

use crate::error::{Result, TrackerError};
use calamine::{open_workbook, Data, Reader, Xlsx};
use media_tracker_common::LinkRow;
use std::path::Path;
use tracing::debug;

/// シートのリンク列を読み込む
///
/// # Arguments
/// * `header_row` - ヘッダー行（1始まり）。この行より下がデータ行
/// * `link_col` - リンク列（1始まり）
pub fn read_hyperlinks(
    path: &Path,
    sheet_name: &str,
    header_row: u32,
    link_col: u16,
) -> Result<Vec<LinkRow>> {
    if !path.exists() {
        return Err(TrackerError::FileNotFound(path.display().to_string()));
    }

    let mut workbook: Xlsx<_> = open_workbook(path)?;
    if !workbook.sheet_names().iter().any(|n| n == sheet_name) {
        return Err(TrackerError::SheetNotFound(sheet_name.to_string()));
    }
    let range = workbook.worksheet_range(sheet_name)?;

    // calamineの位置は0始まり
    let first_data_row = header_row;
    let col = u32::from(link_col.saturating_sub(1));
    let last_row = match range.end() {
        Some((row, _)) => row,
        None => return Ok(Vec::new()),
    };

    let rows: Vec<LinkRow> = (first_data_row..=last_row)
        .enumerate()
        .map(|(row_index, row)| LinkRow {
            row_index,
            raw_link: range.get_value((row, col)).and_then(cell_to_link),
        })
        .collect();

    debug!(
        sheet = sheet_name,
        rows = rows.len(),
        links = rows.iter().filter(|r| r.raw_link.is_some()).count(),
        "hyperlinks read"
    );
    Ok(rows)
}

fn cell_to_link(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
