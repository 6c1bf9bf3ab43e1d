//! Dimensional-analysis rows: a start value multiplied by conversion ratios.
//!
//! Each ratio occupies a formula cell with a unit label to its right. The
//! student may place the ratios in any order; a row may forbid using the
//! same ratio twice.

use crate::criteria::{CheckContext, CombinationCheck, CriterionResult, UnitLabelCheck};
use crate::equivalence::AnswerSpec;
use crate::feedback::FeedbackItem;
use crate::workbook::address::CellAddress;

/// One conversion ratio and the formulas that produce it.
#[derive(Debug, Clone)]
pub struct RatioOption {
    pub unit: String,
    spec: AnswerSpec,
}

impl RatioOption {
    pub fn new(unit: &str, forms: &[&str]) -> Self {
        Self {
            unit: unit.to_string(),
            spec: AnswerSpec::new().accept_all(forms.iter().copied()),
        }
    }
}

/// A ratio formula cell and its unit label cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioPair {
    pub formula: CellAddress,
    pub unit: CellAddress,
}

impl RatioPair {
    /// The label sits one column right of the formula.
    pub fn at(column: char, row: u32) -> Self {
        let formula = CellAddress::at(column, row);
        let unit = CellAddress::new(formula.column() + 1, row);
        Self { formula, unit }
    }
}

/// How per-cell codes are spelled for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeStyle {
    /// `UC27_UNIT_CORRECT`, `UC27_FORMULA_CORRECT`.
    Shared,
    /// `UC26_UNIT_VALID_G`, `UC26_FORMULA_F_VALID`.
    PerColumn,
}

/// Scores for each grading category a ratio row contributes to.
#[derive(Debug, Clone)]
pub struct RatioRowResult {
    pub unit_text: CriterionResult,
    pub formulas: CriterionResult,
    pub final_formula: CriterionResult,
    pub final_unit: CriterionResult,
}

#[derive(Debug, Clone)]
pub struct RatioRowCheck {
    pub prefix: String,
    pub row: u32,
    pub pairs: Vec<RatioPair>,
    pub options: Vec<RatioOption>,
    pub allow_duplicates: bool,
    pub final_units: Vec<String>,
    pub style: CodeStyle,
    pub ratio_points: f64,
    pub unit_points: f64,
    pub final_formula_points: f64,
    pub final_unit_points: f64,
}

impl RatioRowCheck {
    pub fn new(prefix: &str, row: u32, ratio_columns: &[char], options: Vec<RatioOption>) -> Self {
        Self {
            prefix: prefix.to_string(),
            row,
            pairs: ratio_columns.iter().map(|c| RatioPair::at(*c, row)).collect(),
            options,
            allow_duplicates: true,
            final_units: Vec::new(),
            style: CodeStyle::Shared,
            ratio_points: 2.0,
            unit_points: 1.0,
            final_formula_points: 2.0,
            final_unit_points: 1.0,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.allow_duplicates = false;
        self
    }

    pub fn per_column_codes(mut self) -> Self {
        self.style = CodeStyle::PerColumn;
        self
    }

    pub fn final_units(mut self, units: &[&str]) -> Self {
        self.final_units = units.iter().map(|u| u.to_string()).collect();
        self
    }

    fn code(&self, kind: &str, column: &str, ok: bool) -> String {
        match (self.style, kind) {
            (CodeStyle::Shared, _) => {
                let verdict = if ok { "CORRECT" } else { "INCORRECT" };
                format!("{}_{}_{}", self.prefix, kind, verdict)
            }
            (CodeStyle::PerColumn, "UNIT") => {
                let verdict = if ok { "VALID" } else { "INVALID" };
                format!("{}_UNIT_{}_{}", self.prefix, verdict, column)
            }
            (CodeStyle::PerColumn, _) => {
                let verdict = if ok { "VALID" } else { "INVALID" };
                format!("{}_{}_{}_{}", self.prefix, kind, column, verdict)
            }
        }
    }

    fn unit_labels(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.unit.as_str()).collect()
    }

    pub fn check(&self, ctx: &CheckContext<'_>) -> RatioRowResult {
        RatioRowResult {
            unit_text: self.check_units(ctx),
            formulas: self.check_formulas(ctx),
            final_formula: self.check_final_formula(ctx),
            final_unit: self.check_final_unit(ctx),
        }
    }

    fn check_units(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        let labels = self.unit_labels();
        let mut earned = 0.0;
        let mut feedback = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            let column = pair.unit.column_letters();
            let result = UnitLabelCheck::new(pair.unit, labels.iter().copied(), self.unit_points)
                .codes(&self.code("UNIT", &column, true), &self.code("UNIT", &column, false))
                .check(ctx);
            earned += result.earned;
            feedback.extend(result.feedback);
        }
        CriterionResult::new(earned, self.unit_points * self.pairs.len() as f64, feedback)
    }

    fn check_formulas(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        let mut used = vec![false; self.options.len()];
        let mut earned = 0.0;
        let mut feedback = Vec::with_capacity(self.pairs.len());

        for pair in &self.pairs {
            let column = pair.formula.column_letters();
            let matched = self.options.iter().enumerate().position(|(i, option)| {
                (self.allow_duplicates || !used[i])
                    && ctx
                        .engine
                        .classify_cell(ctx.sheet, pair.formula, &option.spec)
                        .tier
                        .is_full()
            });

            match matched {
                Some(i) => {
                    used[i] = true;
                    earned += self.ratio_points;
                    feedback.push(
                        FeedbackItem::new(self.code("FORMULA", &column, true))
                            .cell(pair.formula)
                            .with("ratio", self.options[i].unit.as_str()),
                    );
                }
                None => feedback.push(
                    FeedbackItem::new(self.code("FORMULA", &column, false)).cell(pair.formula),
                ),
            }
        }

        CriterionResult::new(earned, self.ratio_points * self.pairs.len() as f64, feedback)
    }

    fn check_final_formula(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        let mut refs = vec![CellAddress::at('C', self.row).to_string()];
        refs.extend(self.pairs.iter().map(|p| p.formula.to_string()));
        CombinationCheck::new(
            CellAddress::at('O', self.row),
            &refs,
            '*',
            self.final_formula_points,
        )
        .codes(
            &format!("{}_FINAL_FORMULA_CORRECT", self.prefix),
            &format!("{}_FINAL_FORMULA_INCORRECT", self.prefix),
        )
        .check(ctx)
    }

    fn check_final_unit(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        UnitLabelCheck::new(
            CellAddress::at('P', self.row),
            self.final_units.iter(),
            self.final_unit_points,
        )
        .codes(
            &format!("{}_FINAL_UNIT_CORRECT", self.prefix),
            &format!("{}_FINAL_UNIT_INCORRECT", self.prefix),
        )
        .check(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::EquivalenceEngine;
    use crate::workbook::cell::CellValue;
    use crate::workbook::sheet::Worksheet;

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

    fn sheet(cells: &[(&str, CellValue)]) -> Worksheet {
        let mut ws = Worksheet::new("Unit Conversions");
        for (address, value) in cells {
            ws.set_value(address, value.clone());
        }
        ws
    }

    fn formula(text: &str) -> CellValue {
        CellValue::Formula(text.into())
    }

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.into())
    }

    #[test]
    fn test_complete_row_in_either_order() {
        let ws = sheet(&[
            ("F26", formula("=$L$17/$I$17")),
            ("G26", text("mL/tsp")),
            ("I26", formula("=L14")),
            ("J26", text("mcg / mg")),
            ("O26", formula("=C26*F26*I26")),
            ("P26", text("mcg/tsp")),
        ]);
        let engine = EquivalenceEngine::default();
        let result = row26().check(&CheckContext::new(&ws, &engine));
        assert_eq!(result.unit_text.earned, 2.0);
        assert_eq!(result.formulas.earned, 4.0);
        assert_eq!(result.final_formula.earned, 2.0);
        assert_eq!(result.final_unit.earned, 1.0);
        assert_eq!(result.formulas.feedback[0].code, "UC26_FORMULA_F_VALID");
        assert_eq!(result.unit_text.feedback[1].code, "UC26_UNIT_VALID_J");
    }

    #[test]
    fn test_duplicate_ratio_rejected_when_distinct() {
        let ws = sheet(&[("F26", formula("=L14")), ("I26", formula("=L14/1"))]);
        let engine = EquivalenceEngine::default();
        let ctx = CheckContext::new(&ws, &engine);

        let distinct = row26().check(&ctx);
        assert_eq!(distinct.formulas.earned, 2.0);
        assert_eq!(distinct.formulas.feedback[1].code, "UC26_FORMULA_I_INVALID");

        let mut lenient = row26();
        lenient.allow_duplicates = true;
        assert_eq!(lenient.check(&ctx).formulas.earned, 4.0);
    }

    #[test]
    fn test_shared_codes_and_three_ratios() {
        let check = RatioRowCheck::new(
            "UC28",
            28,
            &['F', 'I', 'L'],
            vec![
                RatioOption::new("kg/lb", &["=I9/L9", "=1/L9"]),
                RatioOption::new("in/cm", &["=I20/L20", "=1/L20"]),
            ],
        )
        .final_units(&["kg/cm^2"]);
        let ws = sheet(&[
            ("F28", formula("=1/L9")),
            ("I28", formula("=I20/L20")),
            ("L28", formula("=1/L20")),
            ("M28", text("cm/in")),
            ("O28", formula("=C28*F28*I28")),
        ]);
        let engine = EquivalenceEngine::default();
        let result = check.check(&CheckContext::new(&ws, &engine));
        assert_eq!(result.formulas.earned, 6.0);
        assert_eq!(result.formulas.max, 6.0);
        assert_eq!(result.unit_text.max, 3.0);
        assert_eq!(result.unit_text.feedback[2].code, "UC28_UNIT_INCORRECT");
        assert_eq!(result.final_formula.feedback[0].code, "UC28_FINAL_FORMULA_INCORRECT");
        assert_eq!(result.final_unit.feedback[0].code, "UC28_FINAL_UNIT_INCORRECT");
    }
}
