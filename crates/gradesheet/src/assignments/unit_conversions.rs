//! Unit Conversions: dimensional-analysis rows 26-29 and two temperature
//! conversions.

use crate::aggregate::{aggregate, Summary};
use crate::assignments::{CategoryReport, CategorySlot};
use crate::criteria::{
    CheckContext, CriterionResult, RatioOption, RatioRowCheck, RatioRowResult, SingleCellCheck,
    TierCodes,
};
use crate::equivalence::{AnswerSpec, CreditScale, Requirement, ValueExpr};
use crate::workbook::address::CellAddress;

pub const CATEGORIES: &[CategorySlot] = &[UNIT_TEXT, FORMULAS, FINAL_FORMULA, FINAL_UNIT, TEMPERATURE];

const UNIT_TEXT: CategorySlot = CategorySlot::new("unit_text", 9, 10.0);
const FORMULAS: CategorySlot = CategorySlot::new("formulas", 10, 20.0);
const FINAL_FORMULA: CategorySlot = CategorySlot::new("final_formula", 11, 8.0);
const FINAL_UNIT: CategorySlot = CategorySlot::new("final_unit", 12, 4.0);
const TEMPERATURE: CategorySlot = CategorySlot::new("temp_and_celsius", 13, 4.0);

const CELSIUS_CELL: CellAddress = CellAddress::at('C', 40);
const FAHRENHEIT_CELL: CellAddress = CellAddress::at('A', 41);
const TEMPERATURE_POINTS: f64 = 2.0;

/// A cached result that matches the conversion is worth half.
const TEMPERATURE_SCALE: CreditScale = CreditScale::new(0.5, 0.5);

/// Micrograms per teaspoon.
fn row26() -> RatioRowCheck {
    RatioRowCheck::new(
        "UC26",
        26,
        &['F', 'I'],
        vec![
            RatioOption::new("mcg/mg", &["=L14/I14", "=L14", "=L14/1"]),
            RatioOption::new("ml/tsp", &["=L17/I17", "=L17", "=L17/1"]),
        ],
    )
    .distinct()
    .per_column_codes()
    .final_units(&["mcg/tsp"])
}

/// Gallons per day.
fn row27() -> RatioRowCheck {
    RatioRowCheck::new(
        "UC27",
        27,
        &['F', 'I'],
        vec![
            RatioOption::new("gal/l", &["=L16/I16", "=L16", "=L16/1"]),
            RatioOption::new("h/d", &["=L22/I22", "=L22", "=L22/1"]),
        ],
    )
    .final_units(&["gal/d"])
}

/// Kilograms per square centimetre; the inch ratio is applied twice.
fn row28() -> RatioRowCheck {
    RatioRowCheck::new(
        "UC28",
        28,
        &['F', 'I', 'L'],
        vec![
            RatioOption::new("kg/lb", &["=I9/L9", "=1/L9"]),
            RatioOption::new("in/cm", &["=I20/L20", "=1/L20"]),
        ],
    )
    .final_units(&["kg/cm^2"])
}

/// Feet per hour.
fn row29() -> RatioRowCheck {
    RatioRowCheck::new(
        "UC29",
        29,
        &['F', 'I', 'L'],
        vec![
            RatioOption::new("ft/mi", &["=L21/I21", "=L21", "=L21/1"]),
            RatioOption::new("yr/d", &["=I23/L23", "=1/L23"]),
            RatioOption::new("d/h", &["=I22/L22", "=1/L22"]),
        ],
    )
    .distinct()
    .final_units(&["ft/h", "ft/hr"])
}

pub fn grade(ctx: &CheckContext<'_>) -> Vec<CategoryReport> {
    let rows: Vec<RatioRowResult> = [row26(), row27(), row28(), row29()]
        .iter()
        .map(|row| row.check(ctx))
        .collect();

    let unit_text = rows.iter().map(|r| r.unit_text.clone());
    let formulas = rows.iter().map(|r| r.formulas.clone());
    let final_formula = rows.iter().map(|r| r.final_formula.clone());
    let final_unit = rows.iter().map(|r| r.final_unit.clone());

    vec![
        UNIT_TEXT.report(aggregate(
            unit_text,
            UNIT_TEXT.max,
            &Summary::with_prefix("UC_UNIT_TEXT"),
        )),
        FORMULAS.report(aggregate(
            formulas,
            FORMULAS.max,
            &Summary::with_prefix("UC_FORMULAS"),
        )),
        FINAL_FORMULA.report(aggregate(
            final_formula,
            FINAL_FORMULA.max,
            &Summary::with_prefix("UC_FINAL_FORMULA"),
        )),
        FINAL_UNIT.report(aggregate(
            final_unit,
            FINAL_UNIT.max,
            &Summary::with_prefix("UC_FINAL_UNIT"),
        )),
        TEMPERATURE.report(aggregate(
            temperatures(ctx),
            TEMPERATURE.max,
            &Summary::with_prefix("UC_TEMP"),
        )),
    ]
}

fn temperature_check(
    address: CellAddress,
    expected_form: &str,
    requirement: Requirement,
    expected_value: ValueExpr,
    prefix: &str,
) -> SingleCellCheck {
    let spec = AnswerSpec::new()
        .accept(expected_form)
        .require(requirement)
        .computed(expected_value, Requirement::new())
        .scale(TEMPERATURE_SCALE);
    let partial = format!("{}_PARTIAL", prefix);
    let incorrect = format!("{}_INCORRECT", prefix);
    SingleCellCheck::new(
        address,
        spec,
        TEMPERATURE_POINTS,
        TierCodes::new(
            &format!("{}_CORRECT", prefix),
            &partial,
            &partial,
            &incorrect,
            &incorrect,
        ),
    )
}

fn temperatures(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let fahrenheit = ValueExpr::cell(CellAddress::at('A', 40));
    let celsius = temperature_check(
        CELSIUS_CELL,
        "=(5/9)*(A40-32)",
        Requirement::new()
            .operators("*")
            .fragments(["A40-32", "5/9"]),
        ValueExpr::constant(5.0 / 9.0).mul(fahrenheit.sub(ValueExpr::constant(32.0))),
        "UC_TEMP_C40",
    );

    let celsius_in = ValueExpr::cell(CellAddress::at('C', 41));
    let back = temperature_check(
        FAHRENHEIT_CELL,
        "=(9/5)*C41+32",
        Requirement::new()
            .refs(["C41"])
            .operators("*+")
            .fragments(["9/5", "+32"]),
        ValueExpr::constant(9.0 / 5.0)
            .mul(celsius_in)
            .add(ValueExpr::constant(32.0)),
        "UC_TEMP_A41",
    );

    vec![celsius.check(ctx), back.check(ctx)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::EquivalenceEngine;
    use crate::workbook::cell::{CachedValue, Cell, CellValue};
    use crate::workbook::sheet::Worksheet;

    fn formula(ws: &mut Worksheet, address: &str, text: &str) {
        ws.set_value(address, CellValue::Formula(text.into()));
    }

    fn text(ws: &mut Worksheet, address: &str, value: &str) {
        ws.set_value(address, CellValue::Text(value.into()));
    }

    fn complete_sheet() -> Worksheet {
        let mut ws = Worksheet::new("Unit Conversions");

        formula(&mut ws, "F26", "=L14/I14");
        text(&mut ws, "G26", "mcg/mg");
        formula(&mut ws, "I26", "=L17");
        text(&mut ws, "J26", "mL/tsp");
        formula(&mut ws, "O26", "=C26*F26*I26");
        text(&mut ws, "P26", "mcg/tsp");

        formula(&mut ws, "F27", "=L16");
        text(&mut ws, "G27", "gal/L");
        formula(&mut ws, "I27", "=$L$22/$I$22");
        text(&mut ws, "J27", "hr/day");
        formula(&mut ws, "O27", "=C27*F27*I27");
        text(&mut ws, "P27", "gal/day");

        formula(&mut ws, "F28", "=1/L9");
        text(&mut ws, "G28", "kg/lb");
        formula(&mut ws, "I28", "=I20/L20");
        text(&mut ws, "J28", "in/cm");
        formula(&mut ws, "L28", "=1/L20");
        text(&mut ws, "M28", "in/cm");
        formula(&mut ws, "O28", "=C28*F28*I28*L28");
        text(&mut ws, "P28", "kg/cm^2");

        formula(&mut ws, "F29", "=L21");
        text(&mut ws, "G29", "ft/mi");
        formula(&mut ws, "I29", "=1/L23");
        text(&mut ws, "J29", "year/day");
        formula(&mut ws, "L29", "=I22/L22");
        text(&mut ws, "M29", "day/hr");
        formula(&mut ws, "O29", "=C29*F29*I29*L29");
        text(&mut ws, "P29", "ft/hr");

        ws.set_value("A40", CellValue::Number(212.0));
        formula(&mut ws, "C40", "=5/9*(A40-32)");
        ws.set_value("C41", CellValue::Number(100.0));
        formula(&mut ws, "A41", "=9/5*C41+32");
        ws
    }

    fn grade_sheet(ws: &Worksheet) -> Vec<CategoryReport> {
        let engine = EquivalenceEngine::default();
        grade(&CheckContext::new(ws, &engine))
    }

    #[test]
    fn test_complete_submission() {
        let reports = grade_sheet(&complete_sheet());
        let scores: Vec<(u32, f64)> = reports.iter().map(|r| (r.row, r.score.score)).collect();
        assert_eq!(
            scores,
            vec![(9, 10.0), (10, 20.0), (11, 8.0), (12, 4.0), (13, 4.0)]
        );
        assert_eq!(reports[0].score.feedback[0].code, "UC_UNIT_TEXT_ALL_CORRECT");
    }

    #[test]
    fn test_blank_sheet_scores_zero_everywhere() {
        let reports = grade_sheet(&Worksheet::new("Unit Conversions"));
        for report in &reports {
            assert_eq!(report.score.score, 0.0);
            assert!(report.score.feedback[0].code.ends_with("_NONE_CORRECT"));
        }
        // 10 unit labels and one summary line.
        assert_eq!(reports[0].score.feedback.len(), 11);
    }

    #[test]
    fn test_temperature_value_only_earns_half() {
        let mut ws = complete_sheet();
        let c40 = CellAddress::at('C', 40);
        ws.set(
            c40,
            Cell::new(CellValue::Formula("=(212-32)/1.8".into())).with_cached(CachedValue::Number(100.0)),
        );
        let reports = grade_sheet(&ws);
        let temp = &reports[4];
        assert_eq!(temp.score.score, 3.0);
        assert!(temp
            .score
            .feedback
            .iter()
            .any(|f| f.code == "UC_TEMP_C40_PARTIAL"));
    }

    #[test]
    fn test_row29_rejects_reused_ratio() {
        let mut ws = complete_sheet();
        formula(&mut ws, "L29", "=1/L23");
        let reports = grade_sheet(&ws);
        assert_eq!(reports[1].score.score, 18.0);
        assert!(reports[1]
            .score
            .feedback
            .iter()
            .any(|f| f.code == "UC29_FORMULA_INCORRECT"));
    }
}
