use crate::criteria::{CheckContext, CriterionResult};
use crate::equivalence::{AnswerSpec, Requirement};
use crate::feedback::FeedbackItem;
use crate::workbook::address::CellAddress;

/// A final answer that combines several upstream sub-answers.
///
/// Only the presence of every upstream reference and the combining operator
/// is checked. The sub-answers are criteria of their own and are not
/// re-verified here.
#[derive(Debug, Clone)]
pub struct CombinationCheck {
    pub address: CellAddress,
    pub refs: Vec<String>,
    pub operator: char,
    pub points: f64,
    pub correct_code: String,
    pub incorrect_code: String,
}

impl CombinationCheck {
    pub fn new(address: CellAddress, refs: &[String], operator: char, points: f64) -> Self {
        Self {
            address,
            refs: refs.to_vec(),
            operator,
            points,
            correct_code: "FINAL_FORMULA_CORRECT".to_string(),
            incorrect_code: "FINAL_FORMULA_INCORRECT".to_string(),
        }
    }

    pub fn codes(mut self, correct: &str, incorrect: &str) -> Self {
        self.correct_code = correct.to_string();
        self.incorrect_code = incorrect.to_string();
        self
    }

    fn spec(&self) -> AnswerSpec {
        AnswerSpec::new().require(
            Requirement::new()
                .refs(&self.refs)
                .operators(&self.operator.to_string()),
        )
    }

    pub fn check(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        let classification = ctx.engine.classify_cell(ctx.sheet, self.address, &self.spec());
        if classification.tier.is_full() {
            CriterionResult::full(
                self.points,
                FeedbackItem::new(&self.correct_code).cell(self.address),
            )
        } else {
            CriterionResult::zero(
                self.points,
                FeedbackItem::new(&self.incorrect_code)
                    .cell(self.address)
                    .with("required", self.refs.clone()),
            )
        }
    }
}
