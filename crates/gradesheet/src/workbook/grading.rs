//! In-place editing of one sheet inside an existing grading workbook.
//!
//! The template's formatting must survive, so the sheet part is streamed
//! through unchanged and only the targeted cells are replaced or inserted.
//! Every other package part is copied byte for byte.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::WorkbookError;
use crate::workbook::address::CellAddress;
use crate::workbook::cell::{Cell, CellValue};
use crate::workbook::reader::{
    parse_relationships, parse_workbook_sheets, rels_path_for, WORKBOOK_PART,
};
use crate::workbook::writer::cell_xml;
use crate::workbook::xml;

struct PackageEntry {
    name: String,
    data: Vec<u8>,
}

/// A grading workbook opened for writing scores and feedback into one sheet.
///
/// The package is read into memory on open; the file is not held open.
pub struct GradingWorkbook {
    path: PathBuf,
    entries: Vec<PackageEntry>,
    sheet_part: String,
    sheet_name: String,
    updates: BTreeMap<CellAddress, CellValue>,
}

impl GradingWorkbook {
    /// Opens `path` and locates `sheet_name`, ignoring case and surrounding
    /// whitespace.
    pub fn open(path: &Path, sheet_name: &str) -> Result<Self, WorkbookError> {
        let file = std::fs::File::open(path).map_err(|e| WorkbookError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| WorkbookError::Package {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| WorkbookError::Package {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| WorkbookError::Package {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            entries.push(PackageEntry {
                name: entry.name().to_string(),
                data,
            });
        }

        let text_of = |name: &str| -> Option<String> {
            entries
                .iter()
                .find(|e| e.name == name)
                .map(|e| String::from_utf8_lossy(&e.data).into_owned())
        };

        let workbook_xml = text_of(WORKBOOK_PART).ok_or_else(|| WorkbookError::MissingPart {
            part: WORKBOOK_PART.to_string(),
        })?;
        let rels_path = rels_path_for(WORKBOOK_PART);
        let rels = match text_of(&rels_path) {
            Some(content) => parse_relationships(&rels_path, &content)?,
            None => Vec::new(),
        };

        let wanted = sheet_name.trim().to_lowercase();
        let sheet = parse_workbook_sheets(&workbook_xml, &rels)?
            .into_iter()
            .find(|s| s.name.trim().to_lowercase() == wanted)
            .ok_or_else(|| WorkbookError::SheetNotFound(sheet_name.to_string()))?;

        if !entries.iter().any(|e| e.name == sheet.part) {
            return Err(WorkbookError::MissingPart { part: sheet.part });
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            sheet_part: sheet.part,
            sheet_name: sheet.name,
            updates: BTreeMap::new(),
        })
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set(&mut self, address: CellAddress, value: CellValue) {
        self.updates.insert(address, value);
    }

    pub fn set_number(&mut self, address: &str, value: f64) -> Result<(), WorkbookError> {
        self.set(CellAddress::parse(address)?, CellValue::Number(value));
        Ok(())
    }

    pub fn set_text(&mut self, address: &str, text: impl Into<String>) -> Result<(), WorkbookError> {
        self.set(CellAddress::parse(address)?, CellValue::Text(text.into()));
        Ok(())
    }

    pub fn pending_updates(&self) -> usize {
        self.updates.len()
    }

    /// Writes the edited package back over the original file.
    pub fn save(&self) -> Result<(), WorkbookError> {
        self.save_as(&self.path)
    }

    /// Writes to `target` through a sibling temp file so a failed write never
    /// leaves a truncated workbook behind.
    pub fn save_as(&self, target: &Path) -> Result<(), WorkbookError> {
        let write_err = |reason: String| WorkbookError::Write {
            path: target.to_path_buf(),
            reason,
        };

        let mut patched_sheet = None;
        if let Some(entry) = self.entries.iter().find(|e| e.name == self.sheet_part) {
            let content = String::from_utf8_lossy(&entry.data);
            patched_sheet = Some(patch_sheet_xml(&self.sheet_part, &content, &self.updates)?);
        }

        let tmp = target.with_extension("xlsx.tmp");
        let file = std::fs::File::create(&tmp).map_err(|e| write_err(e.to_string()))?;
        let mut writer = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for entry in &self.entries {
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(|e| write_err(e.to_string()))?;
            let data: &[u8] = match (&patched_sheet, entry.name == self.sheet_part) {
                (Some(patched), true) => patched.as_bytes(),
                _ => &entry.data,
            };
            writer.write_all(data).map_err(|e| write_err(e.to_string()))?;
        }
        writer.finish().map_err(|e| write_err(e.to_string()))?;

        std::fs::rename(&tmp, target).map_err(|e| write_err(e.to_string()))?;
        log::debug!(
            "Saved {} cell update(s) to '{}' in {}",
            self.updates.len(),
            self.sheet_name,
            target.display()
        );
        Ok(())
    }
}

type RowUpdates = BTreeMap<u32, BTreeMap<u32, CellValue>>;

/// Streams a worksheet part, replacing or inserting the given cells while
/// keeping every other byte of markup.
pub(crate) fn patch_sheet_xml(
    part: &str,
    content: &str,
    updates: &BTreeMap<CellAddress, CellValue>,
) -> Result<String, WorkbookError> {
    let mut pending: RowUpdates = BTreeMap::new();
    for (addr, value) in updates {
        pending
            .entry(addr.row())
            .or_default()
            .insert(addr.column(), value.clone());
    }

    let mut reader = Reader::from_str(content);
    let mut out = String::with_capacity(content.len() + updates.len() * 64);

    let mut in_sheet_data = false;
    let mut current_row: Option<u32> = None;
    let mut last_row = 0u32;
    let mut last_col = 0u32;
    let mut skipping_cell = false;

    loop {
        let event = reader.read_event().map_err(|e| WorkbookError::Xml {
            part: part.to_string(),
            reason: e.to_string(),
        })?;

        if skipping_cell {
            if let Event::End(ref e) = event {
                if e.local_name().as_ref() == b"c" {
                    skipping_cell = false;
                }
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                push_raw(&mut out, &event);
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                out.push_str("<sheetData>");
                flush_rows_before(&mut out, &mut pending, u32::MAX);
                out.push_str("</sheetData>");
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                flush_rows_before(&mut out, &mut pending, u32::MAX);
                in_sheet_data = false;
                push_raw(&mut out, &event);
            }
            Event::Start(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_number(e).unwrap_or(last_row + 1);
                flush_rows_before(&mut out, &mut pending, row);
                push_raw(&mut out, &event);
                current_row = Some(row);
                last_row = row;
                last_col = 0;
            }
            Event::Empty(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_number(e).unwrap_or(last_row + 1);
                flush_rows_before(&mut out, &mut pending, row);
                last_row = row;
                match pending.remove(&row) {
                    Some(cells) => {
                        out.push('<');
                        out.push_str(&lossy(e));
                        out.push('>');
                        for (col, value) in cells {
                            out.push_str(&new_cell_xml(CellAddress::new(col, row), value, None));
                        }
                        out.push_str("</row>");
                    }
                    None => push_raw(&mut out, &event),
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"row" => {
                if let Some(row) = current_row.take() {
                    if let Some(cells) = pending.remove(&row) {
                        for (col, value) in cells {
                            out.push_str(&new_cell_xml(CellAddress::new(col, row), value, None));
                        }
                    }
                }
                push_raw(&mut out, &event);
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if current_row.is_some() && e.local_name().as_ref() == b"c" =>
            {
                let row = current_row.unwrap_or(last_row);
                let column = xml::attr(e, b"r")
                    .and_then(|r| CellAddress::parse(&r).ok())
                    .map(|a| a.column())
                    .unwrap_or(last_col + 1);
                last_col = column;

                let mut replacement = None;
                if let Some(cells) = pending.get_mut(&row) {
                    let earlier: Vec<u32> = cells.range(..column).map(|(c, _)| *c).collect();
                    for col in earlier {
                        if let Some(value) = cells.remove(&col) {
                            out.push_str(&new_cell_xml(CellAddress::new(col, row), value, None));
                        }
                    }
                    replacement = cells.remove(&column);
                }

                match replacement {
                    Some(value) => {
                        let style = xml::attr(e, b"s").and_then(|s| s.parse::<usize>().ok());
                        out.push_str(&new_cell_xml(CellAddress::new(column, row), value, style));
                        skipping_cell = matches!(event, Event::Start(_));
                    }
                    None => push_raw(&mut out, &event),
                }
            }
            _ => push_raw(&mut out, &event),
        }
    }

    if !pending.is_empty() {
        log::warn!(
            "{} row(s) of updates had no sheetData to land in for '{}'",
            pending.len(),
            part
        );
    }

    Ok(out)
}

fn row_number(e: &BytesStart<'_>) -> Option<u32> {
    xml::attr(e, b"r").and_then(|r| r.trim().parse().ok())
}

fn flush_rows_before(out: &mut String, pending: &mut RowUpdates, row: u32) {
    let rows: Vec<u32> = pending.range(..row).map(|(r, _)| *r).collect();
    for r in rows {
        if let Some(cells) = pending.remove(&r) {
            out.push_str(&format!(r#"<row r="{}">"#, r));
            for (col, value) in cells {
                out.push_str(&new_cell_xml(CellAddress::new(col, r), value, None));
            }
            out.push_str("</row>");
        }
    }
}

fn new_cell_xml(address: CellAddress, value: CellValue, style: Option<usize>) -> String {
    cell_xml(address, &Cell::new(value), style)
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Re-emits an event exactly as it appeared in the source.
fn push_raw(out: &mut String, event: &Event<'_>) {
    match event {
        Event::Start(e) => {
            out.push('<');
            out.push_str(&lossy(e));
            out.push('>');
        }
        Event::Empty(e) => {
            out.push('<');
            out.push_str(&lossy(e));
            out.push_str("/>");
        }
        Event::End(e) => {
            out.push_str("</");
            out.push_str(&lossy(e));
            out.push('>');
        }
        Event::Text(e) => out.push_str(&lossy(e)),
        Event::GeneralRef(e) => {
            out.push('&');
            out.push_str(&lossy(e));
            out.push(';');
        }
        Event::CData(e) => {
            out.push_str("<![CDATA[");
            out.push_str(&lossy(e));
            out.push_str("]]>");
        }
        Event::Comment(e) => {
            out.push_str("<!--");
            out.push_str(&lossy(e));
            out.push_str("-->");
        }
        Event::Decl(e) => {
            out.push_str("<?");
            out.push_str(&lossy(e));
            out.push_str("?>");
        }
        Event::PI(e) => {
            out.push_str("<?");
            out.push_str(&lossy(e));
            out.push_str("?>");
        }
        Event::DocType(e) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(&lossy(e));
            out.push('>');
        }
        Event::Eof => {}
    }
}
