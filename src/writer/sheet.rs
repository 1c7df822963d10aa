//! ワークシートXMLの sheetData 書き換え
//!
//! 書き換え範囲のセルだけを差し替え、それ以外のセルと sheetData の外側
//! （列幅・結合セル・ハイパーリンクなど）は元のXMLをそのまま残す。
//! 新しい値はインライン文字列で書くので共有文字列テーブルには触れない。

use crate::error::{Result, TrackerError};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;

lazy_static::lazy_static! {
    static ref CELL_REF: Regex = Regex::new(r"^\$?([A-Z]{1,3})\$?([0-9]+)$").unwrap();
}

/// 書き込む値（0始まりの行 → 列 → 文字列）
pub(crate) type CellValues = BTreeMap<u32, BTreeMap<u32, String>>;

struct SheetRow {
    /// 0始まり
    number: u32,
    /// 元の属性（名前と値は生のまま）
    attrs: Vec<(String, String)>,
    cells: Vec<SheetCell>,
}

struct SheetCell {
    col: u32,
    style: Option<String>,
    raw: String,
}

struct ParsedSheet {
    dimension: Option<Range<usize>>,
    /// sheetData の中身。空要素のときは要素全体
    data: Range<usize>,
    empty_data: bool,
    rows: Vec<SheetRow>,
}

/// 書き換え範囲のセルを外して新しい値を入れる
///
/// 書き換え範囲にあった書式付きセルは値だけ消して書式を残す。
pub(crate) fn patch_sheet<F>(xml: &str, rewrite: F, values: CellValues) -> Result<String>
where
    F: Fn(u32, u32) -> bool,
{
    let parsed = parse(xml)?;
    let mut bounds = Bounds::default();
    let mut rows_xml = String::new();
    let mut pending = values.into_iter().peekable();

    for row in parsed.rows {
        while pending.peek().is_some_and(|(r, _)| *r < row.number) {
            if let Some((number, cells)) = pending.next() {
                render_new_row(&mut rows_xml, number, cells, &mut bounds);
            }
        }
        let cells = if pending.peek().is_some_and(|(r, _)| *r == row.number) {
            pending.next().map(|(_, c)| c).unwrap_or_default()
        } else {
            BTreeMap::new()
        };
        render_row(&mut rows_xml, row, cells, &rewrite, &mut bounds);
    }
    for (number, cells) in pending {
        render_new_row(&mut rows_xml, number, cells, &mut bounds);
    }

    let data = parsed.data;
    let mut out = String::with_capacity(xml.len() + rows_xml.len());
    match parsed.dimension.filter(|d| d.end <= data.start) {
        Some(dimension) => {
            out.push_str(&xml[..dimension.start]);
            out.push_str(&format!("<dimension ref=\"{}\"/>", bounds.reference()));
            out.push_str(&xml[dimension.end..data.start]);
        }
        None => out.push_str(&xml[..data.start]),
    }
    if parsed.empty_data {
        out.push_str("<sheetData>");
        out.push_str(&rows_xml);
        out.push_str("</sheetData>");
    } else {
        out.push_str(&rows_xml);
    }
    out.push_str(&xml[data.end..]);
    Ok(out)
}

fn render_row<F>(
    out: &mut String,
    row: SheetRow,
    mut values: BTreeMap<u32, String>,
    rewrite: &F,
    bounds: &mut Bounds,
) where
    F: Fn(u32, u32) -> bool,
{
    let number = row.number;
    let mut touched = !values.is_empty();
    let mut cells: BTreeMap<u32, String> = BTreeMap::new();

    for cell in row.cells {
        if !rewrite(number, cell.col) {
            cells.insert(cell.col, cell.raw);
            continue;
        }
        touched = true;
        match (values.remove(&cell.col), cell.style) {
            (Some(value), style) => {
                cells.insert(cell.col, inline_cell(number, cell.col, style.as_deref(), &value));
            }
            (None, Some(style)) => {
                cells.insert(
                    cell.col,
                    format!("<c r=\"{}\" s=\"{}\"/>", cell_ref(number, cell.col), style),
                );
            }
            (None, None) => {}
        }
    }
    for (col, value) in values {
        cells.insert(col, inline_cell(number, col, None, &value));
    }

    // 書き換えた行の spans は当てにならない
    let attrs: String = row
        .attrs
        .iter()
        .filter(|(key, _)| !(touched && key == "spans"))
        .map(|(key, value)| format!(" {}=\"{}\"", key, value.replace('"', "&quot;")))
        .collect();
    push_row(out, &attrs, number, cells, bounds);
}

fn render_new_row(out: &mut String, number: u32, values: BTreeMap<u32, String>, bounds: &mut Bounds) {
    let cells = values
        .into_iter()
        .map(|(col, value)| (col, inline_cell(number, col, None, &value)))
        .collect();
    push_row(out, &format!(" r=\"{}\"", number + 1), number, cells, bounds);
}

fn push_row(out: &mut String, attrs: &str, number: u32, cells: BTreeMap<u32, String>, bounds: &mut Bounds) {
    if cells.is_empty() {
        out.push_str(&format!("<row{}/>", attrs));
        return;
    }
    out.push_str(&format!("<row{}>", attrs));
    for (col, cell) in cells {
        bounds.include(number, col);
        out.push_str(&cell);
    }
    out.push_str("</row>");
}

fn inline_cell(row: u32, col: u32, style: Option<&str>, value: &str) -> String {
    let style = style.map(|s| format!(" s=\"{}\"", s)).unwrap_or_default();
    let space = if value.trim() != value {
        " xml:space=\"preserve\""
    } else {
        ""
    };
    format!(
        "<c r=\"{}\"{} t=\"inlineStr\"><is><t{}>{}</t></is></c>",
        cell_ref(row, col),
        style,
        space,
        escape(value)
    )
}

fn parse(xml: &str) -> Result<ParsedSheet> {
    let mut reader = Reader::from_str(xml);
    let mut dimension = None;
    let mut data = None;
    let mut rows = Vec::new();

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                dimension = Some(before..reader.buffer_position() as usize);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                data = Some((before..reader.buffer_position() as usize, true));
            }
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                let start = reader.buffer_position() as usize;
                let end = read_rows(&mut reader, xml, &mut rows)?;
                data = Some((start..end, false));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let (data, empty_data) = data.ok_or_else(|| broken("sheetData がありません"))?;
    Ok(ParsedSheet {
        dimension,
        data,
        empty_data,
        rows,
    })
}

/// `</sheetData>` の開始位置を返す
fn read_rows(reader: &mut Reader<&[u8]>, xml: &str, rows: &mut Vec<SheetRow>) -> Result<usize> {
    let mut next = 0;
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let mut row = open_row(&e, next)?;
                read_cells(reader, xml, &mut row)?;
                next = row.number + 1;
                rows.push(row);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let row = open_row(&e, next)?;
                next = row.number + 1;
                rows.push(row);
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => return Ok(before),
            Event::Eof => return Err(broken("sheetData が閉じていません")),
            _ => {}
        }
    }
}

fn read_cells(reader: &mut Reader<&[u8]>, xml: &str, row: &mut SheetRow) -> Result<()> {
    let mut next = 0;
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                reader.read_to_end(e.name())?;
                let cell = open_cell(&e, &xml[before..reader.buffer_position() as usize], row.number, next)?;
                next = cell.col + 1;
                row.cells.push(cell);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let cell = open_cell(&e, &xml[before..reader.buffer_position() as usize], row.number, next)?;
                next = cell.col + 1;
                row.cells.push(cell);
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => return Ok(()),
            Event::Eof => return Err(broken("row が閉じていません")),
            _ => {}
        }
    }
}

fn open_row(e: &BytesStart, next: u32) -> Result<SheetRow> {
    let mut attrs = Vec::new();
    let mut number = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|e| broken(&e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        if key == "r" {
            let r: u32 = value
                .parse()
                .map_err(|_| broken(&format!("行番号が不正: {}", value)))?;
            number = Some(r.saturating_sub(1));
        }
        attrs.push((key, value));
    }
    let number = match number {
        Some(n) => n,
        None => {
            attrs.insert(0, ("r".to_string(), (next + 1).to_string()));
            next
        }
    };
    Ok(SheetRow {
        number,
        attrs,
        cells: Vec::new(),
    })
}

fn open_cell(e: &BytesStart, raw: &str, row: u32, next: u32) -> Result<SheetCell> {
    let mut col = None;
    let mut style = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|e| broken(&e.to_string()))?;
        match attr.key.as_ref() {
            b"r" => {
                let reference = String::from_utf8_lossy(&attr.value).into_owned();
                let (_, c) = parse_ref(&reference)
                    .ok_or_else(|| broken(&format!("セル参照が不正: {}", reference)))?;
                col = Some(c);
            }
            b"s" => style = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            _ => {}
        }
    }

    let (col, raw) = match col {
        Some(c) => (c, raw.to_string()),
        None => {
            // 位置を省略したセルは参照を補う
            let head = 1 + e.name().as_ref().len();
            let raw = format!("{} r=\"{}\"{}", &raw[..head], cell_ref(row, next), &raw[head..]);
            (next, raw)
        }
    };
    Ok(SheetCell { col, style, raw })
}

/// "M5" → (4, 12)
pub(crate) fn parse_ref(reference: &str) -> Option<(u32, u32)> {
    let caps = CELL_REF.captures(reference)?;
    let col = caps[1]
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
    let row: u32 = caps[2].parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// (4, 12) → "M5"
pub(crate) fn cell_ref(row: u32, col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col;
    loop {
        letters.push(char::from(b'A' + (n % 26) as u8));
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    let column: String = letters.iter().rev().collect();
    format!("{}{}", column, row + 1)
}

#[derive(Default)]
struct Bounds {
    range: Option<((u32, u32), (u32, u32))>,
}

impl Bounds {
    fn include(&mut self, row: u32, col: u32) {
        self.range = Some(match self.range {
            None => ((row, col), (row, col)),
            Some(((r0, c0), (r1, c1))) => ((r0.min(row), c0.min(col)), (r1.max(row), c1.max(col))),
        });
    }

    fn reference(&self) -> String {
        match self.range {
            None => "A1".to_string(),
            Some((start, end)) if start == end => cell_ref(start.0, start.1),
            Some((start, end)) => format!("{}:{}", cell_ref(start.0, start.1), cell_ref(end.0, end.1)),
        }
    }
}

fn broken(detail: &str) -> TrackerError {
    TrackerError::ExcelWrite(format!("ワークシートXMLが不正: {}", detail))
}
