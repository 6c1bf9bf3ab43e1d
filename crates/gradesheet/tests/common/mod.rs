//! Shared test utilities for gradesheet integration tests.
//!
//! - `TestHarness` builds an isolated workspace with a grading template and a
//!   submission bundle, and runs the batch pipeline against it
//! - Builders create submission workbooks programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
