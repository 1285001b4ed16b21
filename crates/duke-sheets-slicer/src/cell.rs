//! A1-style anchor cell parsing

use crate::error::{SlicerError, SlicerResult};

/// Maximum number of rows in a worksheet (Excel 2007+)
pub const MAX_ROWS: u32 = 1_048_576;
/// Maximum number of columns in a worksheet (Excel 2007+)
pub const MAX_COLS: u32 = 16_384;

/// 0-based cell coordinates of a drawing anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    /// Parse `E1`, `$B$2`, `xfd1048576`.
    pub fn parse(s: &str) -> SlicerResult<Self> {
        let s = s.trim();
        let invalid = |reason: &str| SlicerError::InvalidOptions(format!("cell '{s}': {reason}"));

        let rest = s.strip_prefix('$').unwrap_or(s);
        let letters_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (letters, rest) = rest.split_at(letters_end);
        if letters.is_empty() {
            return Err(invalid("no column letters"));
        }
        let digits = rest.strip_prefix('$').unwrap_or(rest);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("invalid row number"));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            col = col
                .saturating_mul(26)
                .saturating_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }
        let row: u32 = digits.parse().map_err(|_| invalid("invalid row number"))?;

        if row == 0 || row > MAX_ROWS {
            return Err(invalid("row out of range"));
        }
        if col > MAX_COLS {
            return Err(invalid("column out of range"));
        }

        Ok(Self {
            row: row - 1,
            col: col - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(CellRef::parse("A1").unwrap(), CellRef { row: 0, col: 0 });
        assert_eq!(CellRef::parse("E1").unwrap(), CellRef { row: 0, col: 4 });
        assert_eq!(CellRef::parse("$AA$10").unwrap(), CellRef { row: 9, col: 26 });
        assert_eq!(
            CellRef::parse("xfd1048576").unwrap(),
            CellRef { row: 1_048_575, col: 16_383 }
        );
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "1A", "A", "A0", "XFE1", "A1048577", "A1:B2"] {
            assert!(
                matches!(CellRef::parse(bad), Err(SlicerError::InvalidOptions(_))),
                "{bad} should be rejected"
            );
        }
    }
}
