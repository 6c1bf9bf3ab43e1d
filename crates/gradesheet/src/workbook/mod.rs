//! Spreadsheet document access: the cell model, the `.xlsx` reader and
//! writer, and the grading-sheet editor.

pub mod address;
pub mod cell;
pub mod chart;
pub mod grading;
pub mod reader;
pub mod sheet;
pub mod writer;
mod xml;

pub use address::{column_to_letters, find_references, CellAddress, CellRange, ReferenceToken};
pub use cell::{format_number, CachedValue, Cell, CellValue, GENERAL_FORMAT};
pub use chart::{Axis, Chart, ChartKind, Series, Trendline};
pub use grading::GradingWorkbook;
pub use reader::{read_workbook, read_workbook_bytes};
pub use sheet::{SheetValidation, Workbook, Worksheet};
pub use writer::{workbook_to_bytes, write_workbook};
