//! Feedback codes and their rendering into instructor-facing text.

pub mod catalog;
pub mod item;

pub use catalog::FeedbackCatalog;
pub use item::{FeedbackItem, FeedbackParam};
