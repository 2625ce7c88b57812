//! Writes minimal `.xlsx` workbooks for tests.
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::ZipWriter;
use zip::write::FileOptions;

/// One worksheet column: header, cell values (empty = no cell), visibility.
pub struct SheetColumn {
    pub header: String,
    pub values: Vec<String>,
    pub hidden: bool,
}

impl SheetColumn {
    pub fn new(header: &str, values: &[&str]) -> Self {
        Self {
            header: header.to_string(),
            values: values.iter().map(|v| (*v).to_string()).collect(),
            hidden: false,
        }
    }

    pub fn hidden(header: &str, values: &[&str]) -> Self {
        Self {
            hidden: true,
            ..Self::new(header, values)
        }
    }
}

/// Writes a single-sheet workbook. Headers go through the shared-string
/// table, values are inline strings.
pub fn write_workbook(path: &Path, columns: &[SheetColumn]) {
    let file = File::create(path).expect("create workbook file");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default();

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/sharedStrings.xml", shared_strings(columns)),
        ("xl/worksheets/sheet1.xml", sheet(columns)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options).expect("start zip entry");
        zip.write_all(body.as_bytes()).expect("write zip entry");
    }
    zip.finish().expect("finish workbook");
}

fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(rem).expect("letter")));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn shared_strings(columns: &[SheetColumn]) -> String {
    let items: String = columns
        .iter()
        .map(|c| format!("<si><t>{}</t></si>", escape(&c.header)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">{items}</sst>"#,
        n = columns.len()
    )
}

fn sheet(columns: &[SheetColumn]) -> String {
    let cols: String = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.hidden)
        .map(|(i, _)| format!(r#"<col min="{0}" max="{0}" width="10" hidden="1"/>"#, i + 1))
        .collect();
    let cols = if cols.is_empty() {
        String::new()
    } else {
        format!("<cols>{cols}</cols>")
    };

    let mut rows = String::from(r#"<row r="1">"#);
    for (i, column) in columns.iter().enumerate() {
        rows.push_str(&format!(
            r#"<c r="{}1" t="s"><v>{i}</v></c>"#,
            column_letter(i)
        ));
    }
    rows.push_str("</row>");

    let height = columns.iter().map(|c| c.values.len()).max().unwrap_or(0);
    for row in 0..height {
        let r = row + 2;
        rows.push_str(&format!(r#"<row r="{r}">"#));
        for (i, column) in columns.iter().enumerate() {
            if let Some(value) = column.values.get(row).filter(|v| !v.is_empty()) {
                rows.push_str(&format!(
                    r#"<c r="{}{r}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    column_letter(i),
                    escape(value)
                ));
            }
        }
        rows.push_str("</row>");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{cols}<sheetData>{rows}</sheetData></worksheet>"#
    )
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<bookViews><workbookView activeTab="0"/></bookViews>
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;
