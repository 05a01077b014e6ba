//! A1-style cell references.

use crate::error::YieldError;
use std::fmt;
use std::str::FromStr;

/// Highest column Excel supports (XFD).
const MAX_COLUMN: u32 = 16_384;
/// Highest row Excel supports.
const MAX_ROW: u32 = 1_048_576;

/// Zero-based position of a worksheet cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

impl CellRef {
    pub fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Position in the `(row, column)` order spreadsheet readers use.
    pub fn position(&self) -> (u32, u32) {
        (self.row, u32::from(self.col))
    }
}

impl FromStr for CellRef {
    type Err = YieldError;

    /// Parses `B4`, `b4` and absolute forms like `$D$11`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || YieldError::InvalidCellRef(s.to_string());

        let cleaned: String = s.trim().chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);

        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > MAX_COLUMN {
                return Err(invalid());
            }
        }

        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 || row > MAX_ROW {
            return Err(invalid());
        }

        Ok(Self {
            row: row - 1,
            col: (col - 1) as u16,
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut letters = Vec::new();
        let mut n = u32::from(self.col) + 1;
        while n > 0 {
            let rem = ((n - 1) % 26) as u8;
            letters.push((b'A' + rem) as char);
            n = (n - 1) / 26;
        }
        let column: String = letters.into_iter().rev().collect();
        write!(f, "{}{}", column, self.row + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_cells() {
        assert_eq!("B4".parse::<CellRef>().unwrap(), CellRef::new(3, 1));
        assert_eq!("D11".parse::<CellRef>().unwrap(), CellRef::new(10, 3));
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!("d11".parse::<CellRef>().unwrap(), CellRef::new(10, 3));
        assert_eq!("$D$11".parse::<CellRef>().unwrap(), CellRef::new(10, 3));
        assert_eq!(" A1 ".parse::<CellRef>().unwrap(), CellRef::new(0, 0));
        assert_eq!("AA10".parse::<CellRef>().unwrap(), CellRef::new(9, 26));
        assert_eq!("XFD1".parse::<CellRef>().unwrap(), CellRef::new(0, 16_383));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "B", "4", "11D", "B0", "B-4", "B4C", "XFE1", "A1048577"] {
            assert!(bad.parse::<CellRef>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_display_round_trips() {
        for cell in ["B4", "D11", "Z9", "AA10", "XFD1048576"] {
            assert_eq!(cell.parse::<CellRef>().unwrap().to_string(), cell);
        }
    }
}
