//! Excel (`.xlsx`) table provider.
//!
//! An xlsx file is a zip archive of XML parts. Only the active worksheet is
//! read: its first populated row supplies the column identifiers, every later
//! row supplies cell values, and `<col hidden="1">` ranges mark hidden columns.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument};
use zip::ZipArchive;
use zip::result::ZipError;

use super::{Column, ColumnId, TableError, TableSource};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Active worksheet of an xlsx workbook, loaded into memory.
#[derive(Debug, Clone)]
pub struct XlsxTable {
    name: String,
    path: PathBuf,
    columns: Vec<Column>,
}

impl XlsxTable {
    /// Opens a workbook and reads its active worksheet.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if the file cannot be opened, is not a zip
    /// archive, lacks a required part, or contains invalid XML.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TableError::open(path, e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| TableError::archive(path, e))?;

        let workbook_xml = read_required_part(&mut archive, path, WORKBOOK_PART)?;
        let workbook =
            parse_workbook(&workbook_xml).map_err(|e| TableError::xml(path, WORKBOOK_PART, e))?;
        let Some(rel_id) = workbook
            .sheet_rel_ids
            .get(workbook.active_tab)
            .or_else(|| workbook.sheet_rel_ids.first())
        else {
            return Err(TableError::malformed(path, "workbook lists no worksheets"));
        };

        let rels_xml = read_required_part(&mut archive, path, WORKBOOK_RELS_PART)?;
        let rels = parse_relationships(&rels_xml)
            .map_err(|e| TableError::xml(path, WORKBOOK_RELS_PART, e))?;
        let Some(target) = rels.get(rel_id) else {
            return Err(TableError::malformed(
                path,
                format!("no relationship target for worksheet {rel_id}"),
            ));
        };
        let sheet_part = resolve_part_name(target);

        let shared_strings = match read_part(&mut archive, path, SHARED_STRINGS_PART)? {
            Some(xml) => parse_shared_strings(&xml)
                .map_err(|e| TableError::xml(path, SHARED_STRINGS_PART, e))?,
            None => Vec::new(),
        };

        let sheet_xml = read_required_part(&mut archive, path, &sheet_part)?;
        let sheet = parse_sheet(&sheet_xml, &shared_strings)
            .map_err(|e| TableError::xml(path, sheet_part.as_str(), e))?;
        let columns = sheet.into_columns();

        debug!(
            sheet = %sheet_part,
            columns = columns.len(),
            hidden = columns.iter().filter(|c| !c.visible).count(),
            "loaded worksheet"
        );

        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self {
            name,
            path: path.to_path_buf(),
            columns,
        })
    }

    /// Returns the workbook path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for XlsxTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Result<Vec<Column>, TableError> {
        Ok(self.columns.clone())
    }
}

fn read_part(
    archive: &mut ZipArchive<File>,
    path: &Path,
    part: &str,
) -> Result<Option<String>, TableError> {
    let mut entry = match archive.by_name(part) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(TableError::archive(path, e)),
    };
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| TableError::open(path, e))?;
    Ok(Some(xml))
}

fn read_required_part(
    archive: &mut ZipArchive<File>,
    path: &Path,
    part: &str,
) -> Result<String, TableError> {
    read_part(archive, path, part)?.ok_or_else(|| TableError::missing_part(path, part))
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_part_name(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn xml_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    reader
}

/// Reads an attribute by local name, ignoring namespace prefixes (`r:id` → `id`).
fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct WorkbookInfo {
    sheet_rel_ids: Vec<String>,
    active_tab: usize,
}

fn parse_workbook(xml: &str) -> Result<WorkbookInfo, quick_xml::Error> {
    let mut reader = xml_reader(xml);
    let mut info = WorkbookInfo::default();
    let mut seen_view = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheet" => {
                    if let Some(id) = attribute(&e, b"id")? {
                        info.sheet_rel_ids.push(id);
                    }
                }
                b"workbookView" if !seen_view => {
                    seen_view = true;
                    info.active_tab = attribute(&e, b"activeTab")?
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or(0);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(info)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, quick_xml::Error> {
    let mut reader = xml_reader(xml);
    let mut rels = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) =
                    (attribute(&e, b"Id")?, attribute(&e, b"Target")?)
                {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = xml_reader(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Converts the letter part of a cell reference (`"AB12"`) to a 1-based column number.
fn column_number(reference: &str) -> Option<u32> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .collect();
    if letters.is_empty() {
        return None;
    }
    letters.iter().try_fold(0u32, |acc, letter| {
        acc.checked_mul(26)?
            .checked_add(u32::from(letter.to_ascii_uppercase() - b'A') + 1)
    })
}

#[derive(Debug, Default)]
struct SheetData {
    hidden_ranges: Vec<(u32, u32)>,
    rows: BTreeMap<u32, BTreeMap<u32, String>>,
    /// Highest `<row>` seen, populated or not.
    last_row: u32,
}

impl SheetData {
    fn is_hidden(&self, column: u32) -> bool {
        self.hidden_ranges
            .iter()
            .any(|&(min, max)| (min..=max).contains(&column))
    }

    /// The first populated row becomes the header; duplicate header names get
    /// `.1`, `.2`... suffixes so identifiers stay unique.
    fn into_columns(self) -> Vec<Column> {
        let Some((&header_row, header)) = self.rows.iter().next() else {
            return Vec::new();
        };
        let last_row = self.last_row.max(header_row);
        let mut seen: HashMap<String, usize> = HashMap::new();

        header
            .iter()
            .filter_map(|(&column, text)| {
                let name = text.trim();
                if name.is_empty() {
                    return None;
                }
                let occurrences = seen.entry(name.to_string()).or_insert(0);
                let id = if *occurrences == 0 {
                    name.to_string()
                } else {
                    format!("{name}.{occurrences}")
                };
                *occurrences += 1;

                let values = (header_row + 1..=last_row)
                    .map(|row| {
                        self.rows
                            .get(&row)
                            .and_then(|cells| cells.get(&column))
                            .cloned()
                    })
                    .collect();
                Some(Column {
                    id: ColumnId::new(id),
                    visible: !self.is_hidden(column),
                    values,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Value,
    Inline,
}

#[derive(Debug)]
struct PendingCell {
    column: u32,
    kind: Option<String>,
    value: String,
    inline: String,
}

impl PendingCell {
    fn resolve(self, shared_strings: &[String]) -> Option<String> {
        let text = match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .cloned()?,
            Some("b") => match self.value.trim() {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                _ => return None,
            },
            Some("inlineStr") => self.inline,
            _ => self.value,
        };
        (!text.is_empty()).then_some(text)
    }
}

struct SheetParser<'a> {
    shared_strings: &'a [String],
    sheet: SheetData,
    row: u32,
    column: u32,
    cell: Option<PendingCell>,
    capture: Capture,
    in_phonetic: bool,
}

impl<'a> SheetParser<'a> {
    fn new(shared_strings: &'a [String]) -> Self {
        Self {
            shared_strings,
            sheet: SheetData::default(),
            row: 0,
            column: 0,
            cell: None,
            capture: Capture::None,
            in_phonetic: false,
        }
    }

    fn open(&mut self, element: &BytesStart<'_>, empty: bool) -> Result<(), quick_xml::Error> {
        match element.local_name().as_ref() {
            b"col" => {
                let hidden = attribute(element, b"hidden")?
                    .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
                let min = attribute(element, b"min")?.and_then(|v| v.parse::<u32>().ok());
                let max = attribute(element, b"max")?.and_then(|v| v.parse::<u32>().ok());
                if let (true, Some(min), Some(max)) = (hidden, min, max) {
                    self.sheet.hidden_ranges.push((min, max));
                }
            }
            b"row" => {
                self.row = attribute(element, b"r")?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(self.row + 1);
                self.sheet.last_row = self.sheet.last_row.max(self.row);
                self.column = 0;
            }
            b"c" => {
                self.column = attribute(element, b"r")?
                    .as_deref()
                    .and_then(column_number)
                    .unwrap_or(self.column + 1);
                if !empty {
                    self.cell = Some(PendingCell {
                        column: self.column,
                        kind: attribute(element, b"t")?,
                        value: String::new(),
                        inline: String::new(),
                    });
                }
            }
            b"v" if !empty && self.cell.is_some() => self.capture = Capture::Value,
            b"t" if !empty && self.cell.is_some() && !self.in_phonetic => {
                self.capture = Capture::Inline;
            }
            b"rPh" if !empty => self.in_phonetic = true,
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        match self.capture {
            Capture::Value => cell.value.push_str(text),
            Capture::Inline => cell.inline.push_str(text),
            Capture::None => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"v" | b"t" => self.capture = Capture::None,
            b"rPh" => self.in_phonetic = false,
            b"c" => {
                if let Some(cell) = self.cell.take() {
                    let (row, column) = (self.row, cell.column);
                    if let Some(text) = cell.resolve(self.shared_strings) {
                        self.sheet.rows.entry(row).or_default().insert(column, text);
                    }
                }
            }
            _ => {}
        }
    }
}

fn parse_sheet(xml: &str, shared_strings: &[String]) -> Result<SheetData, quick_xml::Error> {
    let mut reader = xml_reader(xml);
    let mut parser = SheetParser::new(shared_strings);
    loop {
        match reader.read_event()? {
            Event::Start(e) => parser.open(&e, false)?,
            Event::Empty(e) => parser.open(&e, true)?,
            Event::Text(t) => parser.text(&t.unescape()?),
            Event::CData(c) => parser.text(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(e) => parser.close(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(parser.sheet)
}
