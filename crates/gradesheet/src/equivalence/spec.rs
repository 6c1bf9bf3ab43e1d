//! Declarative expected-answer descriptions.
//!
//! An [`AnswerSpec`] is plain data built once per criterion. Every string it
//! holds is normalized on the way in, so the engine only ever compares
//! canonical forms.

use crate::equivalence::tier::{CreditScale, CreditTier};
use crate::equivalence::value::ValueExpr;
use crate::normalize::{normalize_formula, normalize_text};
use crate::workbook::address::{
    column_to_letters, find_references, letters_to_column, CellAddress, ReferenceToken,
};

/// A contiguous single-column row span such as `B14:B63`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeExpectation {
    pub column: u32,
    pub start: u32,
    pub end: u32,
}

impl RangeExpectation {
    /// `column` is given as letters (`"B"`). An unknown column yields a
    /// range no candidate can ever match.
    pub fn new(column: &str, start: u32, end: u32) -> Self {
        Self {
            column: letters_to_column(column).unwrap_or(0),
            start,
            end,
        }
    }

    pub fn column_letters(&self) -> String {
        column_to_letters(self.column)
    }

    /// Canonical text, e.g. `B14:B63`.
    pub fn text(&self) -> String {
        let letters = self.column_letters();
        format!("{}{}:{}{}", letters, self.start, letters, self.end)
    }
}

/// A set of structural conditions that must all hold for a candidate.
///
/// Empty collections impose nothing, so `Requirement::default()` accepts any
/// formula.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirement {
    refs: Vec<CellAddress>,
    operators: Vec<char>,
    functions: Vec<String>,
    leading_functions: Vec<String>,
    columns: Vec<u32>,
    fragments: Vec<String>,
    range: Option<RangeExpectation>,
}

impl Requirement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells that must each appear as a reference. Unparseable addresses
    /// are dropped with a warning.
    pub fn refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for r in refs {
            match CellAddress::parse(r.as_ref()) {
                Ok(address) => self.refs.push(address),
                Err(e) => log::warn!("Dropping required reference: {}", e),
            }
        }
        self
    }

    /// Operator characters that must each appear (`'*'`, `'+'`, ...).
    pub fn operators(mut self, operators: &str) -> Self {
        self.operators.extend(operators.chars());
        self
    }

    /// Function names that must each appear followed by `(`.
    pub fn functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.functions
            .extend(names.into_iter().map(|n| n.as_ref().to_uppercase()));
        self
    }

    /// The formula must open with one of these functions. A leading unary
    /// minus and the `_XLFN.` prefix are tolerated.
    pub fn leading_function<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.leading_functions
            .extend(names.into_iter().map(|n| n.as_ref().to_uppercase()));
        self
    }

    /// Each column must be referenced by at least one cell reference.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns
            .extend(columns.into_iter().filter_map(|c| letters_to_column(c.as_ref())));
        self
    }

    /// Literal text that must occur in the normalized formula (`"A40-32"`).
    pub fn fragments<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fragments
            .extend(fragments.into_iter().map(|f| normalize_formula(f.as_ref())));
        self
    }

    /// The exact range must occur.
    pub fn range(mut self, range: RangeExpectation) -> Self {
        self.range = Some(range);
        self
    }

    /// Checks a normalized formula body (no leading `=`).
    pub fn is_satisfied(&self, body: &str, tokens: &[ReferenceToken]) -> bool {
        self.refs
            .iter()
            .all(|r| tokens.iter().any(|t| t.address() == *r))
            && self.operators.iter().all(|op| body.contains(*op))
            && self
                .functions
                .iter()
                .all(|f| body.contains(&format!("{}(", f)))
            && (self.leading_functions.is_empty()
                || self
                    .leading_functions
                    .iter()
                    .any(|f| opens_with_function(body, f)))
            && self
                .columns
                .iter()
                .all(|c| tokens.iter().any(|t| t.column == *c))
            && self.fragments.iter().all(|f| body.contains(f.as_str()))
            && self.range.is_none_or(|r| body.contains(&r.text()))
    }
}

fn opens_with_function(body: &str, name: &str) -> bool {
    let body = body.strip_prefix('-').unwrap_or(body);
    let body = body.strip_prefix("_XLFN.").unwrap_or(body);
    body.strip_prefix(name)
        .is_some_and(|rest| rest.starts_with('('))
}

/// Range-shaped partial credit: a drag-filled range that drifted a few rows,
/// or two endpoints joined by a comma instead of a colon.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeRule {
    pub expected: RangeExpectation,
    /// Structure the candidate needs before its range is even considered,
    /// typically the right function.
    pub gate: Requirement,
}

/// Credit for a formula whose cached result matches the value the intended
/// formula would have produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedValueRule {
    pub expected: ValueExpr,
    pub gate: Requirement,
    pub tier: CreditTier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSpec {
    pub(crate) accepted: Vec<String>,
    pub(crate) partial_forms: Vec<(String, CreditTier)>,
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) range_rule: Option<RangeRule>,
    pub(crate) computed: Option<ComputedValueRule>,
    pub(crate) fallback: Option<(Requirement, CreditTier)>,
    pub(crate) scale: CreditScale,
}

impl Default for AnswerSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerSpec {
    pub fn new() -> Self {
        Self {
            accepted: Vec::new(),
            partial_forms: Vec::new(),
            requirements: Vec::new(),
            range_rule: None,
            computed: None,
            fallback: None,
            scale: CreditScale::STANDARD,
        }
    }

    /// An accepted answer. The first one given is treated as the expected
    /// form, later ones as alternates; all earn full credit.
    pub fn accept(mut self, form: &str) -> Self {
        self.accepted.push(normalize_text(form));
        self
    }

    pub fn accept_all<I, S>(mut self, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.accepted
            .extend(forms.into_iter().map(|f| normalize_text(f.as_ref())));
        self
    }

    /// A known wrong-but-close form worth `tier`.
    pub fn partial(mut self, form: &str, tier: CreditTier) -> Self {
        self.partial_forms.push((normalize_text(form), tier));
        self
    }

    /// A structural description that earns full credit when satisfied.
    /// Several requirements are alternatives.
    pub fn require(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn range_rule(mut self, expected: RangeExpectation, gate: Requirement) -> Self {
        self.range_rule = Some(RangeRule { expected, gate });
        self
    }

    pub fn computed(mut self, expected: ValueExpr, gate: Requirement) -> Self {
        self.computed = Some(ComputedValueRule {
            expected,
            gate,
            tier: CreditTier::HighPartial,
        });
        self
    }

    /// Last-resort credit when nothing better matched.
    pub fn fallback(mut self, requirement: Requirement, tier: CreditTier) -> Self {
        self.fallback = Some((requirement, tier));
        self
    }

    pub fn scale(mut self, scale: CreditScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn credit_scale(&self) -> CreditScale {
        self.scale
    }

    /// The canonical expected form, for feedback.
    pub fn expected_form(&self) -> Option<&str> {
        self.accepted.first().map(|s| s.as_str())
    }

    pub fn range(&self) -> Option<&RangeRule> {
        self.range_rule.as_ref()
    }

    pub fn computed_rule(&self) -> Option<&ComputedValueRule> {
        self.computed.as_ref()
    }
}

/// Same-sheet references of a normalized formula body.
///
/// `Other!B30` names a cell on another sheet and never stands in for `B30`.
pub(crate) fn tokens_of(body: &str) -> Vec<ReferenceToken> {
    find_references(body)
        .into_iter()
        .filter(|token| !token.sheet_qualified)
        .collect()
}
