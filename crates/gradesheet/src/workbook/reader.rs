//! Reads `.xlsx` packages into the in-memory [`Workbook`] model.
//!
//! Only what grading needs is extracted: cell values, formulas with their
//! cached results, number formats and embedded charts. Everything else in
//! the package is ignored.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::WorkbookError;
use crate::workbook::address::{find_references, CellAddress};
use crate::workbook::cell::{CachedValue, Cell, CellValue, GENERAL_FORMAT};
use crate::workbook::chart::{parse_chart_xml, Chart};
use crate::workbook::sheet::{Workbook, Worksheet};
use crate::workbook::xml;

pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// Opens and fully reads a workbook. The file handle is closed before this
/// returns.
pub fn read_workbook(path: &Path) -> Result<Workbook, WorkbookError> {
    let file = std::fs::File::open(path).map_err(|e| WorkbookError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let archive = zip::ZipArchive::new(file).map_err(|e| WorkbookError::Package {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Package { archive }.read()
}

/// Reads a workbook from an in-memory package.
pub fn read_workbook_bytes(bytes: &[u8]) -> Result<Workbook, WorkbookError> {
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| {
        WorkbookError::Package {
            path: "<memory>".into(),
            reason: e.to_string(),
        }
    })?;

    Package { archive }.read()
}

struct Package<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
}

pub(crate) struct SheetEntry {
    pub name: String,
    pub part: String,
}

impl<R: Read + Seek> Package<R> {
    fn read(mut self) -> Result<Workbook, WorkbookError> {
        let workbook_xml = self
            .part(WORKBOOK_PART)?
            .ok_or_else(|| WorkbookError::MissingPart {
                part: WORKBOOK_PART.to_string(),
            })?;
        let rels = match self.part(&rels_path_for(WORKBOOK_PART))? {
            Some(content) => parse_relationships(&rels_path_for(WORKBOOK_PART), &content)?,
            None => Vec::new(),
        };
        let sheets = parse_workbook_sheets(&workbook_xml, &rels)?;

        let shared_strings = match self.part(SHARED_STRINGS_PART)? {
            Some(content) => parse_shared_strings(&content)?,
            None => Vec::new(),
        };
        let styles = match self.part(STYLES_PART)? {
            Some(content) => parse_styles(&content)?,
            None => StyleTable::default(),
        };

        let mut workbook = Workbook::new();
        for entry in sheets {
            let content = self
                .part(&entry.part)?
                .ok_or_else(|| WorkbookError::MissingPart {
                    part: entry.part.clone(),
                })?;
            let mut sheet = parse_sheet(&entry.name, &entry.part, &content, &shared_strings, &styles)?;
            sheet.charts = self.sheet_charts(&entry.part)?;
            workbook.push(sheet);
        }

        Ok(workbook)
    }

    /// Reads a package part as UTF-8, `None` when absent.
    fn part(&mut self, name: &str) -> Result<Option<String>, WorkbookError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(WorkbookError::Xml {
                    part: name.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| WorkbookError::Xml {
                part: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(content))
    }

    fn sheet_charts(&mut self, sheet_part: &str) -> Result<Vec<Chart>, WorkbookError> {
        let sheet_rels_path = rels_path_for(sheet_part);
        let Some(sheet_rels) = self.part(&sheet_rels_path)? else {
            return Ok(Vec::new());
        };

        let mut charts = Vec::new();
        for drawing in parse_relationships(&sheet_rels_path, &sheet_rels)?
            .into_iter()
            .filter(|r| r.kind.ends_with("/drawing"))
        {
            let drawing_part = resolve_target(sheet_part, &drawing.target);
            let drawing_rels_path = rels_path_for(&drawing_part);
            let Some(drawing_rels) = self.part(&drawing_rels_path)? else {
                continue;
            };

            for chart_rel in parse_relationships(&drawing_rels_path, &drawing_rels)?
                .into_iter()
                .filter(|r| r.kind.ends_with("/chart"))
            {
                let chart_part = resolve_target(&drawing_part, &chart_rel.target);
                match self.part(&chart_part)? {
                    Some(content) => {
                        if let Some(chart) = parse_chart_xml(&chart_part, &content)? {
                            charts.push(chart);
                        }
                    }
                    None => log::debug!("Chart part '{}' referenced but absent", chart_part),
                }
            }
        }

        Ok(charts)
    }
}

// ── Relationships ──

#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub id: String,
    pub kind: String,
    pub target: String,
}

pub(crate) fn parse_relationships(part: &str, content: &str) -> Result<Vec<Relationship>, WorkbookError> {
    let mut reader = Reader::from_str(content);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if xml::attr(e, b"TargetMode").as_deref() == Some("External") {
                    continue;
                }
                if let (Some(id), Some(kind), Some(target)) = (
                    xml::attr(e, b"Id"),
                    xml::attr(e, b"Type"),
                    xml::attr(e, b"Target"),
                ) {
                    rels.push(Relationship { id, kind, target });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }

    Ok(rels)
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
pub(crate) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolves a relationship target against the directory of its source part.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// ── Workbook part ──

pub(crate) fn parse_workbook_sheets(content: &str, rels: &[Relationship]) -> Result<Vec<SheetEntry>, WorkbookError> {
    let mut reader = Reader::from_str(content);
    let mut sheets = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                let (Some(name), Some(rid)) = (xml::attr(e, b"name"), xml::attr(e, b"id")) else {
                    continue;
                };
                match rels.iter().find(|r| r.id == rid) {
                    Some(rel) => sheets.push(SheetEntry {
                        name,
                        part: resolve_target(WORKBOOK_PART, &rel.target),
                    }),
                    None => log::warn!("Sheet '{}' has no relationship '{}'", name, rid),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(WORKBOOK_PART, e)),
            _ => {}
        }
    }

    Ok(sheets)
}

// ── Shared strings ──

fn parse_shared_strings(content: &str) -> Result<Vec<String>, WorkbookError> {
    let mut reader = Reader::from_str(content);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = phonetic_depth == 0,
                b"rPh" => phonetic_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => current.push_str(&xml::text(e)),
            Ok(Event::GeneralRef(ref e)) if in_text => current.push_str(&xml::general_ref(e)),
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(SHARED_STRINGS_PART, e)),
            _ => {}
        }
    }

    Ok(strings)
}

// ── Styles ──

#[derive(Debug, Default)]
struct StyleTable {
    custom_formats: HashMap<u32, String>,
    /// `numFmtId` for each entry of `cellXfs`, indexed by the cell `s` attribute.
    cell_format_ids: Vec<u32>,
}

impl StyleTable {
    fn number_format(&self, style_index: Option<usize>) -> String {
        let id = style_index
            .and_then(|i| self.cell_format_ids.get(i).copied())
            .unwrap_or(0);
        if let Some(code) = self.custom_formats.get(&id) {
            return code.clone();
        }
        builtin_number_format(id)
            .map(str::to_string)
            .unwrap_or_else(|| GENERAL_FORMAT.to_string())
    }
}

fn parse_styles(content: &str) -> Result<StyleTable, WorkbookError> {
    let mut reader = Reader::from_str(content);
    let mut table = StyleTable::default();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"cellXfs" => {
                in_cell_xfs = true;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"cellXfs" => {
                in_cell_xfs = false;
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = xml::attr(e, b"numFmtId").and_then(|v| v.parse::<u32>().ok());
                    if let (Some(id), Some(code)) = (id, xml::attr(e, b"formatCode")) {
                        table.custom_formats.insert(id, code);
                    }
                }
                b"xf" if in_cell_xfs => {
                    let id = xml::attr(e, b"numFmtId")
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(0);
                    table.cell_format_ids.push(id);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(STYLES_PART, e)),
            _ => {}
        }
    }

    Ok(table)
}

/// The number formats Excel knows by id without declaring them.
pub fn builtin_number_format(id: u32) -> Option<&'static str> {
    let code = match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        5 => "\"$\"#,##0_);(\"$\"#,##0)",
        6 => "\"$\"#,##0_);[Red](\"$\"#,##0)",
        7 => "\"$\"#,##0.00_);(\"$\"#,##0.00)",
        8 => "\"$\"#,##0.00_);[Red](\"$\"#,##0.00)",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0_);(#,##0)",
        38 => "#,##0_);[Red](#,##0)",
        39 => "#,##0.00_);(#,##0.00)",
        40 => "#,##0.00_);[Red](#,##0.00)",
        41 => "_(* #,##0_);_(* \\(#,##0\\);_(* \"-\"_);_(@_)",
        42 => "_(\"$\"* #,##0_);_(\"$\"* \\(#,##0\\);_(\"$\"* \"-\"_);_(@_)",
        43 => "_(* #,##0.00_);_(* \\(#,##0.00\\);_(* \"-\"??_);_(@_)",
        44 => "_(\"$\"* #,##0.00_)_(\"$\"* \\(#,##0.00\\)_(\"$\"* \"-\"??_)_(@_)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(code)
}

// ── Worksheets ──

#[derive(Default)]
struct PendingCell {
    address: Option<CellAddress>,
    style: Option<usize>,
    kind: Option<String>,
    formula: Option<String>,
    shared_index: Option<String>,
    value: Option<String>,
    inline: Option<String>,
}

fn parse_sheet(
    name: &str,
    part: &str,
    content: &str,
    shared_strings: &[String],
    styles: &StyleTable,
) -> Result<Worksheet, WorkbookError> {
    let mut reader = Reader::from_str(content);
    let mut sheet = Worksheet::new(name);

    // Shared formula masters by `si`: anchor cell and formula text.
    let mut shared_formulas: HashMap<String, (CellAddress, String)> = HashMap::new();

    let mut pending = PendingCell::default();
    let mut in_cell = false;
    let mut capture: Option<Capture> = None;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"c" => {
                    pending = start_cell(e);
                    in_cell = true;
                }
                b"f" if in_cell => {
                    read_formula_attrs(e, &mut pending);
                    pending.formula = Some(String::new());
                    capture = Some(Capture::Formula);
                }
                b"v" if in_cell => {
                    pending.value = Some(String::new());
                    capture = Some(Capture::Value);
                }
                b"is" if in_cell => pending.inline = Some(String::new()),
                b"t" if in_cell && pending.inline.is_some() && phonetic_depth == 0 => {
                    capture = Some(Capture::Inline);
                }
                b"rPh" => phonetic_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"c" => {
                    let cell = start_cell(e);
                    finish_cell(cell, &mut sheet, &mut shared_formulas, shared_strings, styles);
                }
                b"f" if in_cell => read_formula_attrs(e, &mut pending),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if let Some(target) = capture {
                    push_capture(&mut pending, target, &xml::text(e));
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                if let Some(target) = capture {
                    push_capture(&mut pending, target, &xml::general_ref(e));
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"c" => {
                    let cell = std::mem::take(&mut pending);
                    finish_cell(cell, &mut sheet, &mut shared_formulas, shared_strings, styles);
                    in_cell = false;
                    capture = None;
                }
                b"f" | b"v" | b"t" => capture = None,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }

    Ok(sheet)
}

#[derive(Clone, Copy)]
enum Capture {
    Formula,
    Value,
    Inline,
}

fn push_capture(pending: &mut PendingCell, target: Capture, text: &str) {
    let slot = match target {
        Capture::Formula => pending.formula.as_mut(),
        Capture::Value => pending.value.as_mut(),
        Capture::Inline => pending.inline.as_mut(),
    };
    if let Some(buf) = slot {
        buf.push_str(text);
    }
}

fn start_cell(e: &BytesStart<'_>) -> PendingCell {
    PendingCell {
        address: xml::attr(e, b"r").and_then(|r| CellAddress::parse(&r).ok()),
        style: xml::attr(e, b"s").and_then(|s| s.parse().ok()),
        kind: xml::attr(e, b"t"),
        ..PendingCell::default()
    }
}

fn read_formula_attrs(e: &BytesStart<'_>, pending: &mut PendingCell) {
    if xml::attr(e, b"t").as_deref() == Some("shared") {
        pending.shared_index = xml::attr(e, b"si");
    }
}

fn finish_cell(
    cell: PendingCell,
    sheet: &mut Worksheet,
    shared_formulas: &mut HashMap<String, (CellAddress, String)>,
    shared_strings: &[String],
    styles: &StyleTable,
) {
    let Some(address) = cell.address else {
        log::debug!("Skipping cell without a reference in '{}'", sheet.name);
        return;
    };

    let mut formula = cell.formula.filter(|f| !f.trim().is_empty());
    if let Some(si) = &cell.shared_index {
        match &formula {
            Some(text) => {
                shared_formulas.insert(si.clone(), (address, text.clone()));
            }
            None => {
                if let Some((anchor, text)) = shared_formulas.get(si) {
                    let d_row = i64::from(address.row()) - i64::from(anchor.row());
                    let d_col = i64::from(address.column()) - i64::from(anchor.column());
                    formula = Some(translate_formula(text, d_row, d_col));
                }
            }
        }
    }

    let kind = cell.kind.as_deref().unwrap_or("n");
    let raw = cell.value;

    let (value, cached) = match formula {
        Some(f) => {
            let cached = raw.map(|v| match kind {
                "str" | "inlineStr" => CachedValue::Text(v),
                "b" => CachedValue::Boolean(v.trim() == "1"),
                "e" => CachedValue::Error(v),
                _ => v
                    .trim()
                    .parse::<f64>()
                    .map(CachedValue::Number)
                    .unwrap_or(CachedValue::Text(v)),
            });
            (CellValue::Formula(format!("={}", f.trim())), cached)
        }
        None => {
            let value = match kind {
                "s" => raw
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .and_then(|i| shared_strings.get(i).cloned())
                    .map(CellValue::Text)
                    .unwrap_or(CellValue::Empty),
                "inlineStr" => cell.inline.map(CellValue::Text).unwrap_or(CellValue::Empty),
                "b" => raw
                    .map(|v| CellValue::Boolean(v.trim() == "1"))
                    .unwrap_or(CellValue::Empty),
                "str" | "e" => raw.map(CellValue::Text).unwrap_or(CellValue::Empty),
                _ => match raw {
                    Some(v) => v
                        .trim()
                        .parse::<f64>()
                        .map(CellValue::Number)
                        .unwrap_or(CellValue::Text(v)),
                    None => CellValue::Empty,
                },
            };
            (value, None)
        }
    };

    let mut built = Cell::new(value).with_format(styles.number_format(cell.style));
    built.cached = cached;
    sheet.set(address, built);
}

/// Moves the relative references of a shared formula from its anchor cell to
/// a dependent cell. Absolute parts stay fixed.
pub fn translate_formula(formula: &str, d_row: i64, d_col: i64) -> String {
    let mut out = String::with_capacity(formula.len());
    let mut last = 0;

    for token in find_references(formula) {
        out.push_str(&formula[last..token.start]);
        let row = if token.row_absolute {
            i64::from(token.row)
        } else {
            i64::from(token.row) + d_row
        };
        let column = if token.column_absolute {
            i64::from(token.column)
        } else {
            i64::from(token.column) + d_col
        };

        if row < 1 || column < 1 {
            out.push_str("#REF!");
        } else {
            let letters = crate::workbook::address::column_to_letters(column as u32);
            out.push_str(&format!(
                "{}{}{}{}",
                if token.column_absolute { "$" } else { "" },
                letters,
                if token.row_absolute { "$" } else { "" },
                row
            ));
        }
        last = token.end;
    }
    out.push_str(&formula[last..]);
    out
}

fn xml_error(part: &str, e: quick_xml::Error) -> WorkbookError {
    WorkbookError::Xml {
        part: part.to_string(),
        reason: e.to_string(),
    }
}
