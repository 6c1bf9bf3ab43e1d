//! Canonical string forms for raw cell values.
//!
//! Every comparison the grader makes goes through one of these functions, so
//! they are total (never fail, never panic) and idempotent: feeding a
//! normalized string back in yields the same string.

use crate::workbook::cell::{bool_text, format_number, CellValue};

/// Normalizes any cell value into its comparable form.
///
/// Formula-like text (leading `=`) loses `$` markers and whitespace, is
/// uppercased, and has any parentheses wrapping the whole expression
/// removed. Other text is trimmed. Numbers and booleans become their display
/// text and an empty cell becomes `""`.
pub fn normalize(value: &CellValue) -> String {
    normalize_text(&stringify(value))
}

/// String form of a value before any canonicalization.
pub fn stringify(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Text(s) | CellValue::Formula(s) => s.clone(),
        CellValue::Boolean(b) => bool_text(*b).to_string(),
    }
}

pub fn normalize_text(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_prefix('=') {
        Some(body) => format!("={}", canonical_expression(body)),
        None => trimmed.to_string(),
    }
}

/// Canonicalizes formula text whether or not it carries the leading `=`.
/// The result never starts with `=`.
pub fn normalize_formula(raw: &str) -> String {
    let trimmed = raw.trim();
    canonical_expression(trimmed.strip_prefix('=').unwrap_or(trimmed))
}

fn canonical_expression(body: &str) -> String {
    let compact: String = body
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    strip_outer_parens(&compact).to_string()
}

/// Removes parentheses that wrap the entire expression, repeatedly, so
/// `((A1*B1))` becomes `A1*B1`. Pairs that only wrap part of the expression,
/// as in `(5/9)*(A40-32)`, are left alone.
pub fn strip_outer_parens(expr: &str) -> &str {
    let mut current = expr;
    while current.len() >= 2 && current.starts_with('(') && current.ends_with(')') {
        if !wraps_whole(current) {
            break;
        }
        current = &current[1..current.len() - 1];
    }
    current
}

fn wraps_whole(expr: &str) -> bool {
    let mut depth = 0i32;
    let last = expr.len() - 1;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                // The opening paren closed before the end: it does not wrap
                // everything.
                if depth == 0 && i != last {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Normalizes a unit label such as `Hours/Day` into `hours/d`.
pub fn normalize_unit(value: &CellValue) -> String {
    normalize_unit_text(&stringify(value))
}

/// Lowercases, drops whitespace and folds common abbreviations
/// (`hr` to `h`, `day` to `d`, `year` to `yr`, leading `y/` to `yr/`).
pub fn normalize_unit_text(raw: &str) -> String {
    let mut text: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    // Each substitution shortens the text, so this reaches a fixed point.
    loop {
        let next = text
            .replace("hr", "h")
            .replace("day", "d")
            .replace("year", "yr");
        if next == text {
            break;
        }
        text = next;
    }

    if let Some(rest) = text.strip_prefix("y/") {
        text = format!("yr/{}", rest);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_formula_markers_and_case() {
        let v = CellValue::Formula("= $b$30 * d19 + $B$31".into());
        assert_eq!(normalize(&v), "=B30*D19+B31");
    }

    #[test]
    fn test_normalize_strips_only_wrapping_parens() {
        assert_eq!(normalize_text("=(A1*B1)"), "=A1*B1");
        assert_eq!(normalize_text("=((A1*B1))"), "=A1*B1");
        assert_eq!(normalize_text("=(5/9)*(A40-32)"), "=(5/9)*(A40-32)");
        assert_eq!(normalize_text("=(A1)+(B1)"), "=(A1)+(B1)");
    }

    #[test]
    fn test_normalize_scalars() {
        assert_eq!(normalize(&CellValue::Empty), "");
        assert_eq!(normalize(&CellValue::Number(3.0)), "3");
        assert_eq!(normalize(&CellValue::Number(0.25)), "0.25");
        assert_eq!(normalize(&CellValue::Boolean(true)), "TRUE");
        assert_eq!(normalize(&CellValue::Text("  Japan ".into())), "Japan");
    }

    #[test]
    fn test_normalize_formula_without_equals() {
        assert_eq!(normalize_formula("slope(b19:b26, a19:a26)"), "SLOPE(B19:B26,A19:A26)");
        assert_eq!(normalize_formula("=L14/I14"), "L14/I14");
    }

    #[test]
    fn test_unbalanced_parens_survive() {
        assert_eq!(normalize_text("=(A1"), "=(A1");
        assert_eq!(normalize_text("=A1)"), "=A1)");
        assert_eq!(normalize_text("=()"), "=");
    }

    // ── Units ──

    #[test]
    fn test_unit_abbreviations() {
        assert_eq!(normalize_unit_text("Hours / Day"), "hours/d");
        assert_eq!(normalize_unit_text("ft/hr"), "ft/h");
        assert_eq!(normalize_unit_text("Year/Day"), "yr/d");
        assert_eq!(normalize_unit_text("y/d"), "yr/d");
        assert_eq!(normalize_unit_text("mcg/tsp"), "mcg/tsp");
    }

    #[test]
    fn test_unit_substitution_reaches_fixed_point() {
        assert_eq!(normalize_unit_text("hhrr"), "hh");
        let once = normalize_unit_text("hhrr");
        assert_eq!(normalize_unit_text(&once), once);
    }

    proptest! {
        #[test]
        fn normalize_text_is_idempotent(raw in ".{0,40}") {
            let once = normalize_text(&raw);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn formula_like_input_is_idempotent(body in "[A-Za-z0-9$()+*/ ,:.-]{0,30}") {
            let once = normalize_text(&format!("={}", body));
            prop_assert_eq!(normalize_text(&once), once.clone());
            prop_assert!(once.starts_with('='));
        }

        #[test]
        fn unit_normalization_is_idempotent(raw in "[A-Za-z/ ]{0,20}") {
            let once = normalize_unit_text(&raw);
            prop_assert_eq!(normalize_unit_text(&once), once);
        }

        #[test]
        fn numbers_normalize_without_panicking(n in proptest::num::f64::ANY) {
            let text = normalize(&CellValue::Number(n));
            prop_assert_eq!(normalize_text(&text), text);
        }
    }
}
