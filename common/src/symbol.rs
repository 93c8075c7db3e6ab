//! Currency symbol type for DriftFX market entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency symbol, e.g. `SOL` or `LUN`.
///
/// Symbols are case-normalized to uppercase on construction and serve as
/// the primary key for every currency in the market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new symbol, normalizing to uppercase.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Get the symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the symbol format.
    pub fn is_valid(&self) -> bool {
        // Non-empty, uppercase alphanumeric, reasonable length
        !self.0.is_empty()
            && self.0.len() <= 12
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_lowercase())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(Symbol::new("sol").as_str(), "SOL");
        assert_eq!(Symbol::new(" Lun ").as_str(), "LUN");
        assert_eq!(Symbol::new("VEX"), Symbol::new("vex"));
    }

    #[test]
    fn test_symbol_validation() {
        assert!(Symbol::new("SOL").is_valid());
        assert!(Symbol::new("x7").is_valid());
        assert!(!Symbol::new("").is_valid());
        assert!(!Symbol::new("TOO-DASHED").is_valid());
        assert!(!Symbol::new("WAYTOOLONGSYMBOL").is_valid());
    }
}
