//! xlsx パッケージ（zip）の部品の読み出しと差し替え

use crate::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// 部品をテキストで読む
pub(crate) fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut xml = String::new();
    archive.by_name(name)?.read_to_string(&mut xml)?;
    Ok(xml)
}

/// シート名からワークシート部品のパスを引く
pub(crate) fn worksheet_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    sheet: &str,
) -> Result<Option<String>> {
    let workbook = read_part(archive, WORKBOOK_PART)?;
    let rel_id = match find_element(
        &workbook,
        b"sheet",
        |e| Ok(attr(e, b"name")?.as_deref() == Some(sheet)),
        relationship_id,
    )? {
        Some(id) => id,
        None => return Ok(None),
    };

    let rels = read_part(archive, WORKBOOK_RELS_PART)?;
    let target = find_element(
        &rels,
        b"Relationship",
        |e| Ok(attr(e, b"Id")?.as_deref() == Some(rel_id.as_str())),
        |e| attr(e, b"Target"),
    )?;

    Ok(target.map(|t| match t.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", t),
    }))
}

/// 1つの部品だけ差し替えてパッケージを書き直す
///
/// 他の部品は圧縮済みのバイト列をそのまま写す。
pub(crate) fn replace_part<R, W>(
    archive: &mut ZipArchive<R>,
    part: &str,
    contents: &[u8],
    out: W,
) -> Result<W>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut writer = ZipWriter::new(out);
    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        if file.name() == part {
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(part, options)?;
            writer.write_all(contents)?;
        } else {
            writer.raw_copy_file(file)?;
        }
    }
    Ok(writer.finish()?)
}

/// `name` 要素のうち `matches` を満たす最初のものから値を取り出す
fn find_element<M, V>(xml: &str, name: &[u8], matches: M, value: V) -> Result<Option<String>>
where
    M: Fn(&BytesStart) -> quick_xml::Result<bool>,
    V: Fn(&BytesStart) -> quick_xml::Result<Option<String>>,
{
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == name => {
                if matches(&e)? {
                    return Ok(value(&e)?);
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// r:id（接頭辞は文書による）
fn relationship_id(e: &BytesStart) -> quick_xml::Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id" {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn attr(e: &BytesStart, key: &[u8]) -> quick_xml::Result<Option<String>> {
    Ok(match e.try_get_attribute(key)? {
        Some(a) => Some(a.unescape_value()?.into_owned()),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn package(parts: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        ZipArchive::new(writer.finish().unwrap()).unwrap()
    }

    const WORKBOOK: &str = concat!(
        r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        r#"<sheets><sheet name="January" sheetId="1" r:id="rId1"/>"#,
        r#"<sheet name="R&amp;D" sheetId="2" r:id="rId2"/></sheets></workbook>"#
    );

    const RELS: &str = concat!(
        r#"<Relationships>"#,
        r#"<Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/>"#,
        r#"<Relationship Id="rId2" Type="worksheet" Target="/xl/worksheets/rd.xml"/>"#,
        r#"</Relationships>"#
    );

    #[test]
    fn test_worksheet_part_resolves_relationship() {
        let mut archive = package(&[(WORKBOOK_PART, WORKBOOK), (WORKBOOK_RELS_PART, RELS)]);
        assert_eq!(
            worksheet_part(&mut archive, "January").unwrap().as_deref(),
            Some("xl/worksheets/sheet1.xml")
        );
        assert_eq!(
            worksheet_part(&mut archive, "R&D").unwrap().as_deref(),
            Some("xl/worksheets/rd.xml")
        );
        assert_eq!(worksheet_part(&mut archive, "February").unwrap(), None);
    }

    #[test]
    fn test_replace_part_copies_other_parts() {
        let mut archive = package(&[
            (WORKBOOK_PART, WORKBOOK),
            ("xl/worksheets/sheet1.xml", "<old/>"),
            ("xl/styles.xml", "<styles/>"),
        ]);
        let out = replace_part(&mut archive, "xl/worksheets/sheet1.xml", b"<new/>", Cursor::new(Vec::new()))
            .unwrap();

        let mut rebuilt = ZipArchive::new(out).unwrap();
        let names: Vec<&str> = rebuilt.file_names().collect();
        assert_eq!(names.len(), 3);
        assert_eq!(read_part(&mut rebuilt, "xl/worksheets/sheet1.xml").unwrap(), "<new/>");
        assert_eq!(read_part(&mut rebuilt, "xl/styles.xml").unwrap(), "<styles/>");
        assert_eq!(read_part(&mut rebuilt, WORKBOOK_PART).unwrap(), WORKBOOK);
    }
}
