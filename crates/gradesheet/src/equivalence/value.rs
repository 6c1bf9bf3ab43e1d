//! Expected values derived from other cells' pre-computed results.
//!
//! Nothing here evaluates a student's formula. An expected value is a small
//! arithmetic expression over cached numbers already stored in the document;
//! when any of those numbers is absent the expression has no value and the
//! tier that depends on it cannot be reached.

use serde::{Deserialize, Serialize};

use crate::workbook::address::CellAddress;
use crate::workbook::sheet::Worksheet;

/// Source of pre-computed numbers by address.
pub trait ValueLookup {
    fn number_at(&self, address: CellAddress) -> Option<f64>;
}

impl ValueLookup for Worksheet {
    fn number_at(&self, address: CellAddress) -> Option<f64> {
        self.numeric_value(address)
    }
}

/// A lookup with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValues;

impl ValueLookup for NoValues {
    fn number_at(&self, _address: CellAddress) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Cell(CellAddress),
    Const(f64),
    Add(Box<ValueExpr>, Box<ValueExpr>),
    Sub(Box<ValueExpr>, Box<ValueExpr>),
    Mul(Box<ValueExpr>, Box<ValueExpr>),
    Div(Box<ValueExpr>, Box<ValueExpr>),
}

impl ValueExpr {
    pub fn cell(address: CellAddress) -> Self {
        ValueExpr::Cell(address)
    }

    pub fn constant(value: f64) -> Self {
        ValueExpr::Const(value)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, rhs: ValueExpr) -> Self {
        ValueExpr::Add(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, rhs: ValueExpr) -> Self {
        ValueExpr::Sub(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, rhs: ValueExpr) -> Self {
        ValueExpr::Mul(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, rhs: ValueExpr) -> Self {
        ValueExpr::Div(Box::new(self), Box::new(rhs))
    }

    /// Evaluates against cached numbers. `None` when a referenced cell has no
    /// number, on division by zero, or when the result is not finite.
    pub fn evaluate(&self, values: &dyn ValueLookup) -> Option<f64> {
        let result = match self {
            ValueExpr::Cell(address) => values.number_at(*address)?,
            ValueExpr::Const(c) => *c,
            ValueExpr::Add(a, b) => a.evaluate(values)? + b.evaluate(values)?,
            ValueExpr::Sub(a, b) => a.evaluate(values)? - b.evaluate(values)?,
            ValueExpr::Mul(a, b) => a.evaluate(values)? * b.evaluate(values)?,
            ValueExpr::Div(a, b) => {
                let divisor = b.evaluate(values)?;
                if divisor == 0.0 {
                    return None;
                }
                a.evaluate(values)? / divisor
            }
        };
        result.is_finite().then_some(result)
    }

    /// Every cell the expression depends on.
    pub fn references(&self) -> Vec<CellAddress> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<CellAddress>) {
        match self {
            ValueExpr::Cell(address) => out.push(*address),
            ValueExpr::Const(_) => {}
            ValueExpr::Add(a, b)
            | ValueExpr::Sub(a, b)
            | ValueExpr::Mul(a, b)
            | ValueExpr::Div(a, b) => {
                a.collect_references(out);
                b.collect_references(out);
            }
        }
    }
}

/// Rounding allowance added to every tolerance bound.
const BOUND_SLACK: f64 = 1e-9;

/// Numeric comparison limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueTolerance {
    /// Largest accepted `|actual - expected| / |expected|`, inclusive.
    pub relative: f64,
    /// Largest accepted `|actual|` when the expected value is exactly zero.
    pub zero_absolute: f64,
}

impl Default for ValueTolerance {
    fn default() -> Self {
        Self {
            relative: 0.01,
            zero_absolute: 0.01,
        }
    }
}

impl ValueTolerance {
    pub fn matches(&self, actual: f64, expected: f64) -> bool {
        if !actual.is_finite() || !expected.is_finite() {
            return false;
        }
        if expected == 0.0 {
            return actual.abs() <= self.zero_absolute + BOUND_SLACK;
        }
        // Absorb representation error so a value exactly on the bound matches.
        let scale = expected.abs();
        (actual - expected).abs() <= self.relative * scale + BOUND_SLACK * scale.max(1.0)
    }
}
