//! Currency Conversion: a personal country selection, a travel budget
//! converted into four currencies and back, and currency formatting.

use crate::aggregate::{aggregate, Summary};
use crate::assignments::{CategoryReport, CategorySlot, StudentName};
use crate::criteria::{
    CheckContext, CriterionResult, FormatCheck, FormatRule, SingleCellCheck, TierCodes,
};
use crate::equivalence::{AnswerSpec, Requirement, ValueExpr};
use crate::feedback::FeedbackItem;
use crate::resolve::resolve;
use crate::workbook::address::CellAddress;

pub const CATEGORIES: &[CategorySlot] = &[COUNTRIES, BUDGET, USD_BACK, FORMATTING];

const COUNTRIES: CategorySlot = CategorySlot::new("country_selection", 16, 2.0);
const BUDGET: CategorySlot = CategorySlot::new("budget_conversion", 20, 8.0);
const USD_BACK: CategorySlot = CategorySlot::new("usd_conversion_back", 21, 8.0);
const FORMATTING: CategorySlot = CategorySlot::new("formatting", 22, 3.0);

/// One column per selected country.
const CURRENCY_COLUMNS: [char; 4] = ['C', 'D', 'E', 'F'];
const COUNTRY_ROW: u32 = 16;
const RATE_ROW: u32 = 19;
const BUDGET_ROW: u32 = 20;
const USD_ROW: u32 = 21;

const COUNTRY_POINTS: f64 = 0.5;
const CONVERSION_POINTS: f64 = 2.0;
const FORMAT_POINTS_PER_CELL: f64 = 0.25;
const FORMAT_BONUS: f64 = 1.0;

/// Used when a name has fewer letters than the selection needs.
const FILLER_INITIAL: char = 'm';

/// Countries whose currencies the worksheet's rate table covers.
pub const APPROVED_COUNTRIES: &[&str] = &[
    "afghanistan", "albania", "algeria", "argentina", "armenia", "australia", "austria",
    "azerbaijan", "bahamas", "bahrain", "bangladesh", "belarus", "belgium", "bolivia",
    "botswana", "brazil", "bulgaria", "cambodia", "canada", "chile", "china", "colombia",
    "costa rica", "croatia", "czech republic", "denmark", "dominican republic", "ecuador",
    "egypt", "estonia", "ethiopia", "fiji", "finland", "france", "georgia", "germany",
    "ghana", "greece", "guatemala", "haiti", "honduras", "hungary", "iceland", "india",
    "indonesia", "israel", "italy", "jamaica", "japan", "jordan", "kazakhstan", "kenya",
    "kuwait", "laos", "latvia", "lebanon", "lithuania", "malaysia", "mexico", "mongolia",
    "morocco", "nepal", "netherlands", "new zealand", "nigeria", "norway", "oman",
    "pakistan", "panama", "paraguay", "peru", "philippines", "poland", "portugal", "qatar",
    "romania", "russia", "rwanda", "saudi arabia", "singapore", "south africa",
    "south korea", "spain", "sri lanka", "sweden", "switzerland", "tanzania", "thailand",
    "tunisia", "turkey", "uganda", "ukraine", "united arab emirates", "united kingdom",
    "uruguay", "uzbekistan", "vietnam", "yemen", "zambia",
];

pub fn grade(ctx: &CheckContext<'_>, student: &StudentName) -> Vec<CategoryReport> {
    let budget: Vec<CriterionResult> = CURRENCY_COLUMNS
        .iter()
        .map(|c| budget_check(*c).check(ctx))
        .collect();
    let back: Vec<CriterionResult> = CURRENCY_COLUMNS
        .iter()
        .map(|c| usd_back_check(*c).check(ctx))
        .collect();

    vec![
        COUNTRIES.report(aggregate(
            country_selection(ctx, student),
            COUNTRIES.max,
            &Summary::with_prefix("CC16"),
        )),
        BUDGET.report(aggregate(budget, BUDGET.max, &Summary::with_prefix("CC20"))),
        USD_BACK.report(aggregate(back, USD_BACK.max, &Summary::with_prefix("CC21"))),
        FORMATTING.report(aggregate(
            formatting(ctx),
            FORMATTING.max,
            &Summary::with_prefix("CC22"),
        )),
    ]
}

// ── Country selection ──

fn normalize_country(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_approved(country: &str) -> bool {
    APPROVED_COUNTRIES.contains(&country)
}

fn has_country_starting_with(letter: char) -> bool {
    APPROVED_COUNTRIES.iter().any(|c| c.starts_with(letter))
}

/// `letter` itself when some approved country starts with it, otherwise the
/// next letter of the alphabet that does, wrapping from `z` to `a`.
pub fn available_initial(letter: char) -> char {
    let letter = letter.to_ascii_lowercase();
    if !letter.is_ascii_lowercase() {
        return available_initial(FILLER_INITIAL);
    }
    let start = letter as u8 - b'a';
    (0..26u8)
        .map(|step| char::from(b'a' + (start + step) % 26))
        .find(|c| has_country_starting_with(*c))
        .unwrap_or(letter)
}

/// The four initials the selected countries must start with: the first two
/// letters of the first name, then the first two of the last name.
pub fn expected_initials(student: &StudentName) -> [char; 4] {
    let letters = |name: &str| -> (char, char) {
        let mut chars = name
            .chars()
            .filter(|c| c.is_alphabetic())
            .map(|c| c.to_ascii_lowercase());
        let first = chars.next().unwrap_or(FILLER_INITIAL);
        let second = chars.next().unwrap_or(FILLER_INITIAL);
        (first, second)
    };
    let (f0, f1) = letters(&student.first);
    let (l0, l1) = letters(&student.last);
    [f0, f1, l0, l1].map(available_initial)
}

fn country_selection(ctx: &CheckContext<'_>, student: &StudentName) -> Vec<CriterionResult> {
    let initials = expected_initials(student);
    CURRENCY_COLUMNS
        .iter()
        .zip(initials)
        .map(|(column, initial)| {
            let address = CellAddress::at(*column, COUNTRY_ROW);
            let raw = resolve(ctx.sheet, &address.to_string());
            let country = normalize_country(&raw);
            let expected_letter = initial.to_ascii_uppercase().to_string();

            if country.is_empty() {
                return CriterionResult::zero(
                    COUNTRY_POINTS,
                    FeedbackItem::new("CC16_COUNTRY_BLANK").cell(address),
                );
            }
            if !is_approved(&country) {
                return CriterionResult::zero(
                    COUNTRY_POINTS,
                    FeedbackItem::new("CC16_COUNTRY_NOT_APPROVED")
                        .cell(address)
                        .with("found", raw.trim()),
                );
            }
            if !country.starts_with(initial) {
                return CriterionResult::zero(
                    COUNTRY_POINTS,
                    FeedbackItem::new("CC16_COUNTRY_WRONG_INITIAL")
                        .cell(address)
                        .with("country", raw.trim())
                        .with("expected_letter", expected_letter),
                );
            }
            CriterionResult::full(
                COUNTRY_POINTS,
                FeedbackItem::new("CC16_COUNTRY_CORRECT")
                    .cell(address)
                    .with("country", raw.trim())
                    .with("expected_letter", expected_letter),
            )
        })
        .collect()
}

// ── Conversions ──

fn with_rate_ref(mut result: CriterionResult, rate: CellAddress) -> CriterionResult {
    result.feedback = result
        .feedback
        .into_iter()
        .map(|item| item.with("rate_ref", rate.to_string()))
        .collect();
    result
}

fn conversion_codes(prefix: &str) -> TierCodes {
    TierCodes::new(
        &format!("{}_FORMULA_OK", prefix),
        &format!("{}_FORMULA_PARTIAL", prefix),
        &format!("{}_FORMULA_PARTIAL", prefix),
        &format!("{}_FORMULA_BAD", prefix),
        &format!("{}_FORMULA_MISSING", prefix),
    )
}

/// A conversion cell plus the rate it must use.
struct ConversionCheck {
    inner: SingleCellCheck,
    rate: CellAddress,
}

impl ConversionCheck {
    fn check(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        with_rate_ref(self.inner.check(ctx), self.rate)
    }
}

/// `{col}20 = B4 * {col}19`: the USD budget in the local currency.
fn budget_check(column: char) -> ConversionCheck {
    let rate = CellAddress::at(column, RATE_ROW);
    let usd = CellAddress::at('B', 4);
    let spec = AnswerSpec::new()
        .accept(&format!("={}*{}", usd, rate))
        .accept(&format!("={}*{}", rate, usd))
        .computed(
            ValueExpr::cell(usd).mul(ValueExpr::cell(rate)),
            Requirement::new().refs([usd.to_string(), rate.to_string()]),
        );
    ConversionCheck {
        inner: SingleCellCheck::new(
            CellAddress::at(column, BUDGET_ROW),
            spec,
            CONVERSION_POINTS,
            conversion_codes("CC20"),
        ),
        rate,
    }
}

/// `{col}21 = D4 / {col}19`: a local amount back in USD. Dividing the
/// row-20 budget by the same rate is also a correct round trip.
fn usd_back_check(column: char) -> ConversionCheck {
    let rate = CellAddress::at(column, RATE_ROW);
    let local = CellAddress::at('D', 4);
    let budget = CellAddress::at(column, BUDGET_ROW);
    let spec = AnswerSpec::new()
        .accept(&format!("={}/{}", local, rate))
        .require(
            Requirement::new()
                .refs([budget.to_string(), rate.to_string()])
                .operators("/"),
        )
        .computed(
            ValueExpr::cell(local).div(ValueExpr::cell(rate)),
            Requirement::new().refs([local.to_string(), rate.to_string()]),
        );
    ConversionCheck {
        inner: SingleCellCheck::new(
            CellAddress::at(column, USD_ROW),
            spec,
            CONVERSION_POINTS,
            conversion_codes("CC21"),
        ),
        rate,
    }
}

// ── Formatting ──

fn formatting(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let row = |r: u32| CURRENCY_COLUMNS.map(|c| CellAddress::at(c, r));
    let cells = CURRENCY_COLUMNS.len() * 2;
    let format = FormatCheck::new("CC22_FORMAT", FORMAT_POINTS_PER_CELL * cells as f64)
        .label("C20:F21")
        .reported_group(row(BUDGET_ROW), FormatRule::Currency)
        .reported_group(row(USD_ROW), FormatRule::Currency)
        .check(ctx);
    let bonus = CriterionResult::full(
        FORMAT_BONUS,
        FeedbackItem::new("CC22_FORMAT_BONUS").with("points", FORMAT_BONUS),
    );
    vec![format, bonus]
}
