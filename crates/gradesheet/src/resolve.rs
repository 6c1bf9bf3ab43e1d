//! Effective cell text, following one `=OtherCell` link.

use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::stringify;
use crate::workbook::address::CellAddress;
use crate::workbook::cell::CellValue;
use crate::workbook::sheet::Worksheet;

static RE_SINGLE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=\s*\$?([A-Za-z]{1,3})\$?(\d+)\s*$").unwrap());

/// The address a formula points at when it is nothing but one same-sheet
/// reference (`=B4`, `=$B$4`).
pub fn single_reference(formula: &str) -> Option<CellAddress> {
    let caps = RE_SINGLE_REFERENCE.captures(formula.trim())?;
    CellAddress::parse(&format!("{}{}", &caps[1], &caps[2])).ok()
}

/// The value a reader would consider the answer at `address`.
///
/// A formula that is only a reference to another cell yields that cell's raw
/// value; the link is followed once and never further. Every other formula is
/// returned unchanged so a checker can fail it explicitly.
pub fn resolve_value(sheet: &Worksheet, address: &str) -> CellValue {
    let value = sheet.value(address);
    if let CellValue::Formula(f) = &value {
        if let Some(target) = single_reference(f) {
            return sheet
                .cell(target)
                .map(|c| c.value.clone())
                .unwrap_or_default();
        }
    }
    value
}

/// [`resolve_value`] as trimmed text, `""` for an empty cell.
pub fn resolve(sheet: &Worksheet, address: &str) -> String {
    stringify(&resolve_value(sheet, address)).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Worksheet {
        let mut ws = Worksheet::new("Unit Conversions");
        ws.set_value("G26", CellValue::Formula("=$Q$5".into()));
        ws.set_value("Q5", CellValue::Text(" mcg/mg ".into()));
        ws.set_value("J26", CellValue::Formula("=Q6".into()));
        ws.set_value("Q6", CellValue::Formula("=Q7".into()));
        ws.set_value("Q7", CellValue::Text("ml/tsp".into()));
        ws.set_value("O26", CellValue::Formula("=C26*F26*I26".into()));
        ws.set_value("P26", CellValue::Text("mcg/tsp".into()));
        ws.set_value("M26", CellValue::Formula("=Z99".into()));
        ws
    }

    #[test]
    fn test_follows_single_link() {
        assert_eq!(resolve(&sheet(), "G26"), "mcg/mg");
    }

    #[test]
    fn test_follows_only_one_hop() {
        assert_eq!(resolve(&sheet(), "J26"), "=Q7");
    }

    #[test]
    fn test_other_formulas_returned_verbatim() {
        assert_eq!(resolve(&sheet(), "O26"), "=C26*F26*I26");
    }

    #[test]
    fn test_blank_and_dangling() {
        let ws = sheet();
        assert_eq!(resolve(&ws, "A1"), "");
        assert_eq!(resolve(&ws, "M26"), "");
        assert_eq!(resolve(&ws, "P26"), "mcg/tsp");
    }

    #[test]
    fn test_single_reference_shapes() {
        assert_eq!(single_reference("=$b$4").map(|a| a.to_string()), Some("B4".into()));
        assert!(single_reference("=B4*2").is_none());
        assert!(single_reference("='Other'!B4").is_none());
        assert!(single_reference("B4").is_none());
    }
}
