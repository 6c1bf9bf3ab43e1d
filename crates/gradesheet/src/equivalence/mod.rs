//! Tiered answer matching.
//!
//! A criterion describes its expected answer as an [`AnswerSpec`]; the
//! [`EquivalenceEngine`] compares a normalized candidate against it and
//! returns exactly one [`CreditTier`].

pub mod engine;
pub mod spec;
pub mod tier;
pub mod value;

pub use engine::{Classification, EquivalenceEngine, Evidence, MatchReason};
pub use spec::{AnswerSpec, ComputedValueRule, RangeExpectation, RangeRule, Requirement};
pub use tier::{CreditScale, CreditTier};
pub use value::{NoValues, ValueExpr, ValueLookup, ValueTolerance};
