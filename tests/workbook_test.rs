//! ワークブック読み書きの統合テスト
//!
//! rust_xlsxwriter で作ったワークブックに書き込み、calamine で読み戻して確認する。
//! 書式などセル値以外の保持は zip から部品を直接読んで確認する。

use calamine::{open_workbook, Data, Reader, Xlsx};
use media_coverage_tracker::error::TrackerError;
use media_coverage_tracker::reader::read_hyperlinks;
use media_coverage_tracker::writer::{write_results, OutputLayout};
use media_tracker_common::{match_categories, CategoryFlags, Taxonomy, LINK_FIELD};
use rust_xlsxwriter::{Format, Formula, Workbook};
use std::io::Read;
use std::path::Path;
use tempfile::tempdir;

fn create_tracker(path: &Path) {
    let mut workbook = Workbook::new();

    let links = workbook.add_worksheet();
    links.set_name("January").unwrap();
    links.write_string(0, 0, "Date").unwrap();
    links.write_string(0, 1, "Link").unwrap();
    links.write_string(1, 1, "http://x.com/a.png").unwrap();
    // 3行目はリンクなし
    links.write_string(2, 0, "2026-01-03").unwrap();
    links.write_string(3, 1, "  http://y.com/article  ").unwrap();

    let scorecard = workbook.add_worksheet();
    scorecard.set_name("MediaScorecard").unwrap();
    scorecard.write_string(0, 0, "Trimble Media Scorecard").unwrap();
    // ヘッダー行より上はクリア対象外
    scorecard.write_string(2, 12, "keep above").unwrap();
    // クリア範囲より左
    scorecard.write_number(9, 11, 42.0).unwrap();
    // 前回の結果（消えるべき）
    scorecard.write_string(4, 12, "Old header").unwrap();
    scorecard.write_string(20, 40, "X").unwrap();
    // クリア範囲より右
    scorecard.write_string(6, 75, "keep right").unwrap();

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_number(0, 0, 1.0).unwrap();
    notes.write_number(0, 1, 2.0).unwrap();
    notes.write_formula(0, 2, Formula::new("=A1+B1")).unwrap();

    workbook.save(path).unwrap();
}

fn text(range: &calamine::Range<Data>, row: u32, col: u32) -> String {
    range
        .get_value((row, col))
        .map(|d| d.to_string())
        .unwrap_or_default()
}

fn layout() -> OutputLayout {
    OutputLayout {
        origin_col: 13,
        ..OutputLayout::default()
    }
}

#[test]
fn test_read_hyperlinks() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("tracker.xlsx");
    create_tracker(&path);

    let rows = read_hyperlinks(&path, "January", 1, 2).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].row_index, 0);
    assert_eq!(rows[0].raw_link.as_deref(), Some("http://x.com/a.png"));
    assert_eq!(rows[1].raw_link, None);
    assert_eq!(rows[2].raw_link.as_deref(), Some("http://y.com/article"));
}

#[test]
fn test_read_missing_sheet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracker.xlsx");
    create_tracker(&path);

    let result = read_hyperlinks(&path, "February", 1, 2);
    assert!(matches!(result, Err(TrackerError::SheetNotFound(name)) if name == "February"));
}

#[test]
fn test_read_missing_file() {
    let result = read_hyperlinks(Path::new("/nonexistent/tracker.xlsx"), "January", 1, 2);
    assert!(matches!(result, Err(TrackerError::FileNotFound(_))));
}

#[test]
fn test_write_round_trip_preserves_outside_cells() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracker.xlsx");
    create_tracker(&path);

    let taxonomy = Taxonomy::new(["Construction", "Surveying"]).unwrap();
    let rows = vec![
        match_categories(&taxonomy, "http://x.com/a.png", "Construction site"),
        match_categories(&taxonomy, "http://y.com/article", "Surveying: yes"),
    ];
    write_results(&path, &layout(), &taxonomy, &rows).unwrap();

    let mut book: Xlsx<_> = open_workbook(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["January", "MediaScorecard", "Notes"]);

    let range = book.worksheet_range("MediaScorecard").unwrap();
    // ヘッダーと結果行（13列目 = 0始まり12）
    assert_eq!(text(&range, 4, 12), "Construction");
    assert_eq!(text(&range, 4, 13), "Surveying");
    assert_eq!(text(&range, 4, 14), LINK_FIELD);
    assert_eq!(text(&range, 5, 12), "X");
    assert_eq!(text(&range, 5, 13), "");
    assert_eq!(text(&range, 5, 14), "http://x.com/a.png");
    assert_eq!(text(&range, 6, 12), "");
    assert_eq!(text(&range, 6, 13), "X");
    assert_eq!(text(&range, 6, 14), "http://y.com/article");
    assert_eq!(text(&range, 7, 12), "");

    // 前回の結果は消える
    assert_eq!(text(&range, 20, 40), "");

    // 範囲外はそのまま
    assert_eq!(text(&range, 0, 0), "Trimble Media Scorecard");
    assert_eq!(text(&range, 2, 12), "keep above");
    assert_eq!(range.get_value((9, 11)), Some(&Data::Float(42.0)));
    assert_eq!(text(&range, 6, 75), "keep right");

    // 他のシートも残る
    let notes = book.worksheet_range("Notes").unwrap();
    assert_eq!(notes.get_value((0, 0)), Some(&Data::Float(1.0)));
    let formulas = book.worksheet_formula("Notes").unwrap();
    assert_eq!(
        formulas.get_value((0, 2)).map(String::as_str),
        Some("A1+B1")
    );

    let links = book.worksheet_range("January").unwrap();
    assert_eq!(text(&links, 1, 1), "http://x.com/a.png");
}

#[test]
fn test_write_is_repeatable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracker.xlsx");
    create_tracker(&path);

    let taxonomy = Taxonomy::new(["Construction", "Surveying"]).unwrap();
    let first = vec![
        match_categories(&taxonomy, "http://a", "Construction"),
        match_categories(&taxonomy, "http://b", "Surveying"),
        match_categories(&taxonomy, "http://c", "nothing"),
    ];
    write_results(&path, &layout(), &taxonomy, &first).unwrap();

    // 2回目は行数が少ない
    let second = vec![CategoryFlags::unset(&taxonomy, "http://d")];
    write_results(&path, &layout(), &taxonomy, &second).unwrap();

    let mut book: Xlsx<_> = open_workbook(&path).unwrap();
    let range = book.worksheet_range("MediaScorecard").unwrap();
    assert_eq!(text(&range, 5, 14), "http://d");
    assert_eq!(text(&range, 6, 14), "");
    assert_eq!(text(&range, 7, 14), "");
    assert_eq!(text(&range, 6, 13), "");
}

#[test]
fn test_write_missing_output_sheet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracker.xlsx");
    create_tracker(&path);

    let layout = OutputLayout {
        sheet: "Scorecard2".into(),
        ..layout()
    };
    let taxonomy = Taxonomy::new(["Construction"]).unwrap();
    let result = write_results(&path, &layout, &taxonomy, &[]);
    assert!(matches!(result, Err(TrackerError::SheetNotFound(_))));
}

#[test]
fn test_write_too_wide_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracker.xlsx");
    create_tracker(&path);
    let before = std::fs::read(&path).unwrap();

    // 75列を13列目から書くと範囲を超える
    let taxonomy = Taxonomy::media_default().unwrap();
    let rows = vec![CategoryFlags::unset(&taxonomy, "http://a")];
    let result = write_results(&path, &layout(), &taxonomy, &rows);

    assert!(matches!(result, Err(TrackerError::LayoutMismatch(_))));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

fn read_part(path: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut xml = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut xml).unwrap();
    xml
}

/// 既定レイアウト（A列から書く）の出力シート
fn create_default_scorecard(path: &Path) {
    let mut workbook = Workbook::new();
    let scorecard = workbook.add_worksheet();
    scorecard.set_name("MediaScorecard").unwrap();

    let bold = Format::new().set_bold();
    scorecard.write_url(0, 0, "https://www.trimble.com").unwrap();
    scorecard.merge_range(1, 0, 1, 5, "Q1 Scorecard", &bold).unwrap();
    scorecard.set_column_width(1, 60).unwrap();
    // 結果行の書式付きセル
    scorecard.write_string_with_format(5, 6, "X", &bold).unwrap();

    workbook.save(path).unwrap();
}

#[test]
fn test_default_layout_repeat_write_clears_unset_marks() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracker.xlsx");
    create_default_scorecard(&path);

    let taxonomy = Taxonomy::media_default().unwrap();
    let layout = OutputLayout::default();
    let corporate = taxonomy.header().iter().position(|h| *h == "Corporate").unwrap() as u32;
    let aeco = taxonomy.header().iter().position(|h| *h == "AECO").unwrap() as u32;
    let link = taxonomy.link_position() as u32;

    let first = vec![match_categories(&taxonomy, "http://a", "Corporate AECO news")];
    write_results(&path, &layout, &taxonomy, &first).unwrap();
    {
        let mut book: Xlsx<_> = open_workbook(&path).unwrap();
        let range = book.worksheet_range("MediaScorecard").unwrap();
        assert_eq!(text(&range, 5, corporate), "X");
        assert_eq!(text(&range, 5, aeco), "X");
    }

    // 2回目はどのカテゴリにも当たらない
    let second = vec![match_categories(&taxonomy, "http://b", "nothing here")];
    write_results(&path, &layout, &taxonomy, &second).unwrap();

    let mut book: Xlsx<_> = open_workbook(&path).unwrap();
    let range = book.worksheet_range("MediaScorecard").unwrap();
    assert_eq!(text(&range, 4, corporate), "Corporate");
    assert_eq!(text(&range, 5, corporate), "");
    assert_eq!(text(&range, 5, aeco), "");
    assert_eq!(text(&range, 5, link), "http://b");
}

#[test]
fn test_write_preserves_formatting_and_other_parts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracker.xlsx");
    create_default_scorecard(&path);
    let styles_before = read_part(&path, "xl/styles.xml");
    let rels_before = read_part(&path, "xl/worksheets/_rels/sheet1.xml.rels");

    let taxonomy = Taxonomy::media_default().unwrap();
    let rows = vec![CategoryFlags::unset(&taxonomy, "http://a")];
    write_results(&path, &OutputLayout::default(), &taxonomy, &rows).unwrap();

    let mut book: Xlsx<_> = open_workbook(&path).unwrap();
    let range = book.worksheet_range("MediaScorecard").unwrap();
    assert_eq!(text(&range, 0, 0), "https://www.trimble.com");
    assert_eq!(text(&range, 1, 0), "Q1 Scorecard");
    assert_eq!(text(&range, 5, 6), "");

    let merged = book.worksheet_merge_cells("MediaScorecard").unwrap().unwrap();
    assert!(merged
        .iter()
        .any(|d| d.start == (1, 0) && d.end == (1, 5)));

    let sheet = read_part(&path, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<hyperlink ref="A1""#));
    assert!(sheet.contains(r#"<col min="2" max="2""#));
    // 値は消えても書式は残る
    assert!(sheet.contains(r#"<c r="G6" s=""#));

    assert_eq!(read_part(&path, "xl/styles.xml"), styles_before);
    assert_eq!(read_part(&path, "xl/worksheets/_rels/sheet1.xml.rels"), rels_before);
    assert!(rels_before.contains("https://www.trimble.com"));
}
