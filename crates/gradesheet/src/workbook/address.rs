//! A1-style cell addressing.

use std::fmt;
use std::str::FromStr;

use crate::error::WorkbookError;

/// Largest column Excel supports (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// Largest row Excel supports.
pub const MAX_ROW: u32 = 1_048_576;

/// A single cell position. Ordering is row-major so a `BTreeMap` keyed by
/// address iterates cells in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    row: u32,
    column: u32,
}

impl CellAddress {
    /// Both `column` and `row` are 1-based.
    pub fn new(column: u32, row: u32) -> Self {
        Self { row, column }
    }

    /// Parses `B30`, `$B$30`, `b30`. Sheet-qualified references are rejected.
    pub fn parse(text: &str) -> Result<Self, WorkbookError> {
        let trimmed = text.trim();
        let invalid = || WorkbookError::InvalidAddress(text.to_string());

        let cleaned: String = trimmed.chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);

        if letters.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let column = letters_to_column(letters).ok_or_else(invalid)?;
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 || row > MAX_ROW {
            return Err(invalid());
        }

        Ok(Self { row, column })
    }

    /// Address in a single-letter column, for layouts fixed at compile time.
    /// `column` must be an uppercase ASCII letter.
    pub const fn at(column: char, row: u32) -> Self {
        Self {
            row,
            column: column as u32 - 'A' as u32 + 1,
        }
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn column_letters(&self) -> String {
        column_to_letters(self.column)
    }

    pub fn with_row(&self, row: u32) -> Self {
        Self {
            row,
            column: self.column,
        }
    }

    /// Shifts by a signed delta, returning `None` when the result falls off
    /// the sheet.
    pub fn offset(&self, d_row: i64, d_col: i64) -> Option<Self> {
        let row = i64::from(self.row) + d_row;
        let column = i64::from(self.column) + d_col;
        if row < 1 || column < 1 || row > i64::from(MAX_ROW) || column > i64::from(MAX_COLUMN) {
            return None;
        }
        Some(Self {
            row: row as u32,
            column: column as u32,
        })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.column), self.row)
    }
}

impl FromStr for CellAddress {
    type Err = WorkbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Converts a 1-based column index to letters (`1 -> A`, `27 -> AA`).
pub fn column_to_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Converts column letters to a 1-based index, case-insensitively.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut column: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        column = column * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    if column > MAX_COLUMN {
        return None;
    }
    Some(column)
}

/// A rectangular block of cells such as `E19:E35`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    start: CellAddress,
    end: CellAddress,
}

impl CellRange {
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let top = start.row.min(end.row);
        let bottom = start.row.max(end.row);
        let left = start.column.min(end.column);
        let right = start.column.max(end.column);
        Self {
            start: CellAddress::new(left, top),
            end: CellAddress::new(right, bottom),
        }
    }

    pub fn parse(text: &str) -> Result<Self, WorkbookError> {
        match text.split_once(':') {
            Some((a, b)) => Ok(Self::new(CellAddress::parse(a)?, CellAddress::parse(b)?)),
            None => {
                let single = CellAddress::parse(text)?;
                Ok(Self::new(single, single))
            }
        }
    }

    /// A vertical span in one single-letter column (`CellRange::column('E', 19, 35)`).
    pub const fn column(column: char, first_row: u32, last_row: u32) -> Self {
        Self {
            start: CellAddress::at(column, first_row),
            end: CellAddress::at(column, last_row),
        }
    }

    pub fn start(&self) -> CellAddress {
        self.start
    }

    pub fn end(&self) -> CellAddress {
        self.end
    }

    pub fn len(&self) -> usize {
        let rows = (self.end.row - self.start.row + 1) as usize;
        let cols = (self.end.column - self.start.column + 1) as usize;
        rows * cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Addresses in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.column..=self.end.column).map(move |col| CellAddress::new(col, row))
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// One cell reference found inside formula text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    /// Byte span of the reference in the source text, `$` markers included.
    pub start: usize,
    pub end: usize,
    pub column: u32,
    pub row: u32,
    pub column_absolute: bool,
    pub row_absolute: bool,
    /// Preceded by a `Sheet!` prefix, or the far end of such a range.
    pub sheet_qualified: bool,
}

impl ReferenceToken {
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.column, self.row)
    }

    /// The reference without `$` markers, uppercased (`B30`).
    pub fn plain(&self) -> String {
        format!("{}{}", column_to_letters(self.column), self.row)
    }
}

/// Finds every A1 cell reference in formula text.
///
/// String literals are skipped, and so are identifiers that are really
/// function names (`LOG10(`) or part of a longer word.
pub fn find_references(formula: &str) -> Vec<ReferenceToken> {
    let bytes = formula.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' {
            in_string = !in_string;
            i += 1;
            continue;
        }
        if in_string {
            i += 1;
            continue;
        }

        let boundary_ok = i == 0 || {
            let prev = bytes[i - 1];
            !(prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'.')
        };
        if !boundary_ok || !(b == b'$' || b.is_ascii_alphabetic()) {
            i += 1;
            continue;
        }

        match scan_reference(bytes, i) {
            Some(mut token) => {
                // `Other!B3:B9` qualifies both ends of the range.
                if !token.sheet_qualified && token.start > 0 && bytes[token.start - 1] == b':' {
                    token.sheet_qualified = tokens.last().is_some_and(|prev: &ReferenceToken| {
                        prev.sheet_qualified && prev.end + 1 == token.start
                    });
                }
                i = token.end;
                tokens.push(token);
            }
            None => {
                // Skip the rest of this identifier so its tail is never read
                // as a reference of its own.
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
            }
        }
    }

    tokens
}

fn scan_reference(bytes: &[u8], start: usize) -> Option<ReferenceToken> {
    let mut i = start;

    let column_absolute = bytes.get(i) == Some(&b'$');
    if column_absolute {
        i += 1;
    }
    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = &bytes[letters_start..i];
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let row_absolute = bytes.get(i) == Some(&b'$');
    if row_absolute {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let digits = &bytes[digits_start..i];
    if digits.is_empty() {
        return None;
    }

    // A trailing identifier character or an opening paren means this was a
    // name such as `LOG10(` or `A1B`, not a reference.
    if let Some(&next) = bytes.get(i) {
        if next.is_ascii_alphanumeric() || next == b'_' || next == b'(' {
            return None;
        }
    }

    let column = letters_to_column(std::str::from_utf8(letters).ok()?)?;
    let row: u32 = std::str::from_utf8(digits).ok()?.parse().ok()?;
    if row == 0 || row > MAX_ROW {
        return None;
    }

    Some(ReferenceToken {
        start,
        end: i,
        column,
        row,
        column_absolute,
        row_absolute,
        sheet_qualified: start > 0 && bytes[start - 1] == b'!',
    })
}
