//! Writes the in-memory [`Workbook`] model as a new `.xlsx` package.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::WorkbookError;
use crate::workbook::address::CellAddress;
use crate::workbook::cell::{CachedValue, Cell, CellValue, GENERAL_FORMAT};
use crate::workbook::chart::chart_to_xml;
use crate::workbook::reader::builtin_number_format;
use crate::workbook::sheet::{Workbook, Worksheet};
use crate::workbook::xml;

const FIRST_CUSTOM_FORMAT_ID: u32 = 164;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub fn write_workbook(workbook: &Workbook, path: &Path) -> Result<(), WorkbookError> {
    let bytes = workbook_to_bytes(workbook)?;
    std::fs::write(path, bytes).map_err(|e| WorkbookError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn workbook_to_bytes(workbook: &Workbook) -> Result<Vec<u8>, WorkbookError> {
    let styles = StyleRegistry::collect(workbook);
    let mut parts: Vec<(String, String)> = Vec::new();
    let mut overrides: Vec<(String, &str)> = Vec::new();
    let mut chart_counter = 0usize;

    for (idx, sheet) in workbook.sheets().iter().enumerate() {
        let n = idx + 1;
        let sheet_part = format!("xl/worksheets/sheet{}.xml", n);
        let has_drawing = !sheet.charts.is_empty();
        parts.push((sheet_part.clone(), sheet_xml(sheet, &styles, has_drawing)));
        overrides.push((
            format!("/{}", sheet_part),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
        ));

        if has_drawing {
            let drawing_part = format!("xl/drawings/drawing{}.xml", n);
            parts.push((
                format!("xl/worksheets/_rels/sheet{}.xml.rels", n),
                relationships_xml(&[(
                    "rId1".to_string(),
                    format!("{}/drawing", NS_REL),
                    format!("../drawings/drawing{}.xml", n),
                )]),
            ));

            let mut chart_rels = Vec::new();
            for chart in &sheet.charts {
                chart_counter += 1;
                let chart_part = format!("xl/charts/chart{}.xml", chart_counter);
                parts.push((chart_part.clone(), chart_to_xml(chart)));
                overrides.push((
                    format!("/{}", chart_part),
                    "application/vnd.openxmlformats-officedocument.drawingml.chart+xml",
                ));
                chart_rels.push((
                    format!("rId{}", chart_rels.len() + 1),
                    format!("{}/chart", NS_REL),
                    format!("../charts/chart{}.xml", chart_counter),
                ));
            }

            parts.push((drawing_part.clone(), drawing_xml(chart_rels.len())));
            parts.push((
                format!("xl/drawings/_rels/drawing{}.xml.rels", n),
                relationships_xml(&chart_rels),
            ));
            overrides.push((
                format!("/{}", drawing_part),
                "application/vnd.openxmlformats-officedocument.drawing+xml",
            ));
        }
    }

    let workbook_rels: Vec<(String, String, String)> = (1..=workbook.sheets().len())
        .map(|n| {
            (
                format!("rId{}", n),
                format!("{}/worksheet", NS_REL),
                format!("worksheets/sheet{}.xml", n),
            )
        })
        .chain(std::iter::once((
            format!("rId{}", workbook.sheets().len() + 1),
            format!("{}/styles", NS_REL),
            "styles.xml".to_string(),
        )))
        .collect();

    parts.push(("xl/workbook.xml".to_string(), workbook_xml(workbook)));
    parts.push(("xl/_rels/workbook.xml.rels".to_string(), relationships_xml(&workbook_rels)));
    parts.push(("xl/styles.xml".to_string(), styles.to_xml()));
    parts.push((
        "_rels/.rels".to_string(),
        relationships_xml(&[(
            "rId1".to_string(),
            format!("{}/officeDocument", NS_REL),
            "xl/workbook.xml".to_string(),
        )]),
    ));
    overrides.push((
        "/xl/workbook.xml".to_string(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
    ));
    overrides.push((
        "/xl/styles.xml".to_string(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
    ));
    parts.insert(0, ("[Content_Types].xml".to_string(), content_types_xml(&overrides)));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in parts {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| write_error(&name, e))?;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| write_error(&name, e))?;
    }

    let cursor = writer.finish().map_err(|e| write_error("package", e))?;
    Ok(cursor.into_inner())
}

fn write_error(part: &str, e: impl std::fmt::Display) -> WorkbookError {
    WorkbookError::Write {
        path: part.into(),
        reason: e.to_string(),
    }
}

// ── Styles ──

/// Assigns one `cellXfs` entry per distinct number format.
struct StyleRegistry {
    /// Format code -> (numFmtId, xf index).
    formats: BTreeMap<String, (u32, usize)>,
    /// `numFmtId` for each xf, in order. Index 0 is General.
    xfs: Vec<u32>,
    custom: Vec<(u32, String)>,
}

impl StyleRegistry {
    fn collect(workbook: &Workbook) -> Self {
        let mut registry = Self {
            formats: BTreeMap::new(),
            xfs: vec![0],
            custom: Vec::new(),
        };
        registry
            .formats
            .insert(GENERAL_FORMAT.to_string(), (0, 0));

        for sheet in workbook.sheets() {
            for (_, cell) in sheet.iter() {
                registry.register(&cell.number_format);
            }
        }
        registry
    }

    fn register(&mut self, code: &str) {
        if self.formats.contains_key(code) {
            return;
        }
        let id = (0..=49)
            .find(|id| builtin_number_format(*id) == Some(code))
            .unwrap_or_else(|| {
                let id = FIRST_CUSTOM_FORMAT_ID + self.custom.len() as u32;
                self.custom.push((id, code.to_string()));
                id
            });
        self.xfs.push(id);
        self.formats.insert(code.to_string(), (id, self.xfs.len() - 1));
    }

    fn style_index(&self, code: &str) -> usize {
        self.formats.get(code).map(|(_, idx)| *idx).unwrap_or(0)
    }

    fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push_str(&format!(r#"<styleSheet xmlns="{}">"#, NS_MAIN));
        if !self.custom.is_empty() {
            out.push_str(&format!(r#"<numFmts count="{}">"#, self.custom.len()));
            for (id, code) in &self.custom {
                out.push_str(&format!(
                    r#"<numFmt numFmtId="{}" formatCode="{}"/>"#,
                    id,
                    xml::escape(code)
                ));
            }
            out.push_str("</numFmts>");
        }
        out.push_str(r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#);
        out.push_str(r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#);
        out.push_str(r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#);
        out.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);
        out.push_str(&format!(r#"<cellXfs count="{}">"#, self.xfs.len()));
        for id in &self.xfs {
            let apply = if *id == 0 { "" } else { r#" applyNumberFormat="1""# };
            out.push_str(&format!(
                r#"<xf numFmtId="{}" fontId="0" fillId="0" borderId="0" xfId="0"{}/>"#,
                id, apply
            ));
        }
        out.push_str("</cellXfs></styleSheet>");
        out
    }
}

// ── Parts ──

fn workbook_xml(workbook: &Workbook) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push_str(&format!(r#"<workbook xmlns="{}" xmlns:r="{}"><sheets>"#, NS_MAIN, NS_REL));
    for (idx, sheet) in workbook.sheets().iter().enumerate() {
        out.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml::escape(&sheet.name),
            idx + 1,
            idx + 1
        ));
    }
    out.push_str("</sheets></workbook>");
    out
}

fn sheet_xml(sheet: &Worksheet, styles: &StyleRegistry, has_drawing: bool) -> String {
    let mut rows: BTreeMap<u32, Vec<(CellAddress, &Cell)>> = BTreeMap::new();
    for (addr, cell) in sheet.iter() {
        rows.entry(addr.row()).or_default().push((*addr, cell));
    }

    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push_str(&format!(r#"<worksheet xmlns="{}" xmlns:r="{}"><sheetData>"#, NS_MAIN, NS_REL));
    for (row, cells) in rows {
        out.push_str(&format!(r#"<row r="{}">"#, row));
        for (addr, cell) in cells {
            let style = styles.style_index(&cell.number_format);
            out.push_str(&cell_xml(addr, cell, (style > 0).then_some(style)));
        }
        out.push_str("</row>");
    }
    out.push_str("</sheetData>");
    if has_drawing {
        out.push_str(r#"<drawing r:id="rId1"/>"#);
    }
    out.push_str("</worksheet>");
    out
}

/// Serializes one cell. Text is written inline so no shared string table is
/// needed.
pub(crate) fn cell_xml(address: CellAddress, cell: &Cell, style: Option<usize>) -> String {
    let style_attr = style.map(|s| format!(r#" s="{}""#, s)).unwrap_or_default();
    match &cell.value {
        CellValue::Empty => format!(r#"<c r="{}"{}/>"#, address, style_attr),
        CellValue::Number(n) => format!(r#"<c r="{}"{}><v>{}</v></c>"#, address, style_attr, n),
        CellValue::Boolean(b) => format!(
            r#"<c r="{}"{} t="b"><v>{}</v></c>"#,
            address,
            style_attr,
            u8::from(*b)
        ),
        CellValue::Text(text) => inline_text_xml(address, &style_attr, text),
        CellValue::Formula(formula) => {
            let body = formula.strip_prefix('=').unwrap_or(formula);
            let (kind, cached) = match &cell.cached {
                Some(CachedValue::Number(n)) => ("", format!("<v>{}</v>", n)),
                Some(CachedValue::Text(s)) => (r#" t="str""#, format!("<v>{}</v>", xml::escape(s))),
                Some(CachedValue::Boolean(b)) => (r#" t="b""#, format!("<v>{}</v>", u8::from(*b))),
                Some(CachedValue::Error(e)) => (r#" t="e""#, format!("<v>{}</v>", xml::escape(e))),
                None => ("", String::new()),
            };
            format!(
                r#"<c r="{}"{}{}><f>{}</f>{}</c>"#,
                address,
                style_attr,
                kind,
                xml::escape(body),
                cached
            )
        }
    }
}

pub(crate) fn inline_text_xml(address: CellAddress, style_attr: &str, text: &str) -> String {
    format!(
        r#"<c r="{}"{} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        address,
        style_attr,
        xml::escape(text)
    )
}

fn relationships_xml(rels: &[(String, String, String)]) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push_str(&format!(r#"<Relationships xmlns="{}">"#, NS_PKG_REL));
    for (id, kind, target) in rels {
        out.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id,
            kind,
            xml::escape(target)
        ));
    }
    out.push_str("</Relationships>");
    out
}

fn content_types_xml(overrides: &[(String, &str)]) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    out.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    out.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    for (part, content_type) in overrides {
        out.push_str(&format!(
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            part, content_type
        ));
    }
    out.push_str("</Types>");
    out
}

fn drawing_xml(chart_count: usize) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push_str(&format!(
        r#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:r="{}">"#,
        NS_REL
    ));
    for idx in 0..chart_count {
        let top = 1 + idx * 16;
        out.push_str(&format!(
            concat!(
                "<xdr:twoCellAnchor>",
                "<xdr:from><xdr:col>6</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{top}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>",
                "<xdr:to><xdr:col>14</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{bottom}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>",
                r#"<xdr:graphicFrame macro=""><xdr:nvGraphicFramePr><xdr:cNvPr id="{id}" name="Chart {n}"/><xdr:cNvGraphicFramePr/></xdr:nvGraphicFramePr>"#,
                r#"<xdr:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></xdr:xfrm>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:chart r:id="rId{n}"/></a:graphicData></a:graphic>"#,
                "</xdr:graphicFrame><xdr:clientData/></xdr:twoCellAnchor>"
            ),
            top = top,
            bottom = top + 15,
            id = idx + 2,
            n = idx + 1
        ));
    }
    out.push_str("</xdr:wsDr>");
    out
}
