use std::collections::BTreeMap;

use crate::workbook::address::{CellAddress, CellRange};
use crate::workbook::cell::{Cell, CellValue};
use crate::workbook::chart::Chart;

/// One worksheet: its cells keyed by address, plus any embedded charts.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    cells: BTreeMap<CellAddress, Cell>,
    pub charts: Vec<Chart>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            charts: Vec::new(),
        }
    }

    pub fn set(&mut self, address: CellAddress, cell: Cell) {
        if matches!(cell.value, CellValue::Empty)
            && cell.cached.is_none()
            && cell.number_format == crate::workbook::cell::GENERAL_FORMAT
        {
            self.cells.remove(&address);
        } else {
            self.cells.insert(address, cell);
        }
    }

    /// Sets a value by A1 text, keeping the cell's number format. An invalid
    /// address is ignored and logged.
    pub fn set_value(&mut self, address: &str, value: CellValue) {
        match CellAddress::parse(address) {
            Ok(addr) => {
                let format = self
                    .cells
                    .get(&addr)
                    .map(|c| c.number_format.clone())
                    .unwrap_or_else(|| crate::workbook::cell::GENERAL_FORMAT.to_string());
                self.set(addr, Cell::new(value).with_format(format));
            }
            Err(e) => log::warn!("Ignoring write to '{}': {}", address, e),
        }
    }

    pub fn cell(&self, address: CellAddress) -> Option<&Cell> {
        self.cells.get(&address)
    }

    /// Looks up a cell by A1 text. Unparseable addresses read as absent.
    pub fn get(&self, address: &str) -> Option<&Cell> {
        CellAddress::parse(address)
            .ok()
            .and_then(|a| self.cells.get(&a))
    }

    /// The raw value at `address`, `Empty` when nothing is stored.
    pub fn value(&self, address: &str) -> CellValue {
        self.get(address)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn number_format(&self, address: &str) -> String {
        self.get(address)
            .map(|c| c.number_format.clone())
            .unwrap_or_else(|| crate::workbook::cell::GENERAL_FORMAT.to_string())
    }

    pub fn numeric_value(&self, address: CellAddress) -> Option<f64> {
        self.cells.get(&address).and_then(|c| c.numeric_value())
    }

    pub fn range<'a>(&'a self, range: &'a CellRange) -> impl Iterator<Item = (CellAddress, Option<&'a Cell>)> + 'a {
        range.cells().map(move |addr| (addr, self.cells.get(&addr)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellAddress, &Cell)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// The outcome of matching a submission's tabs against the required names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetValidation {
    /// Required name to the actual tab name found in the workbook.
    pub sheet_map: BTreeMap<String, String>,
    pub missing: Vec<String>,
}

impl SheetValidation {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn actual_name(&self, required: &str) -> Option<&str> {
        self.sheet_map.get(required).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sheet: Worksheet) {
        self.sheets.push(sheet);
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Finds a tab ignoring case and surrounding whitespace.
    pub fn sheet_ci(&self, name: &str) -> Option<&Worksheet> {
        let wanted = name.trim().to_lowercase();
        self.sheets
            .iter()
            .find(|s| s.name.trim().to_lowercase() == wanted)
    }

    pub fn validate_required_sheets(&self, required: &[&str]) -> SheetValidation {
        let mut validation = SheetValidation::default();
        for name in required {
            match self.sheet_ci(name) {
                Some(sheet) => {
                    validation
                        .sheet_map
                        .insert((*name).to_string(), sheet.name.clone());
                }
                None => validation.missing.push((*name).to_string()),
            }
        }
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_keeps_existing_format() {
        let mut ws = Worksheet::new("Income Analysis");
        let addr = CellAddress::parse("B30").unwrap();
        ws.set(addr, Cell::new(CellValue::Number(1.0)).with_format("0.00"));
        ws.set_value("B30", CellValue::Formula("=SLOPE(B19:B26,A19:A26)".into()));
        assert_eq!(ws.number_format("B30"), "0.00");
        assert!(ws.value("B30").is_formula());
    }

    #[test]
    fn test_missing_cell_reads_empty() {
        let ws = Worksheet::new("x");
        assert_eq!(ws.value("Z99"), CellValue::Empty);
        assert_eq!(ws.number_format("Z99"), "General");
    }

    #[test]
    fn test_validate_required_sheets_case_insensitive() {
        let mut wb = Workbook::new();
        wb.push(Worksheet::new(" income analysis "));
        wb.push(Worksheet::new("UNIT CONVERSIONS"));

        let v = wb.validate_required_sheets(&[
            "Income Analysis",
            "Unit Conversions",
            "Currency Conversion",
        ]);
        assert!(!v.is_complete());
        assert_eq!(v.missing, vec!["Currency Conversion"]);
        assert_eq!(v.actual_name("Income Analysis"), Some(" income analysis "));
    }
}
