//! Memory budgets.
//!
//! Budgets are plain byte counts that can be parsed from, and displayed as,
//! human-readable sizes. A bare unit (`k`, `m`, `g`, ...) or one ending in
//! `ib` (`KiB`, `MiB`, ...) is binary, while one ending in `b` (`kb`, `MB`,
//! ...) is decimal. Units are case-insensitive.

use std::sync::LazyLock;

use regex::Regex;

/// The pattern for a budget.
static REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)\s*([0-9]+)\s*([a-z]*)\s*$").unwrap());

/// The unit prefixes, in increasing powers.
const PREFIXES: [&str; 6] = ["k", "m", "g", "t", "p", "e"];

/// The binary unit names used when formatting.
const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// An error related to parsing a [`Budget`].
#[derive(Debug, Eq, PartialEq)]
pub enum ParseError {
    /// The input was not a whole number followed by an optional unit.
    Invalid(String),

    /// The unit was not recognized.
    UnknownUnit(String),

    /// The budget does not fit in 64 bits.
    Overflow(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Invalid(s) => write!(f, "invalid memory budget: `{s}`"),
            ParseError::UnknownUnit(unit) => write!(f, "unknown memory unit: `{unit}`"),
            ParseError::Overflow(s) => write!(f, "memory budget is too large: `{s}`"),
        }
    }
}

impl std::error::Error for ParseError {}

/// A memory budget in bytes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Budget(u64);

impl Budget {
    /// Creates a new [`Budget`] of `bytes`.
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Gets the number of bytes.
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Budget {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

/// Gets the multiplier for a (lowercase) unit.
fn coefficient(unit: &str) -> Option<u64> {
    if unit.is_empty() {
        return Some(1);
    }

    let (prefix, base) = if let Some(prefix) = unit.strip_suffix("ib") {
        (prefix, 1024u64)
    } else if let Some(prefix) = unit.strip_suffix('b') {
        (prefix, 1000u64)
    } else {
        (unit, 1024u64)
    };

    let power = PREFIXES.iter().position(|p| *p == prefix)? as u32 + 1;
    base.checked_pow(power)
}

impl std::str::FromStr for Budget {
    type Err = ParseError;

    /// Parses a [`Budget`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::budget::Budget;
    ///
    /// assert_eq!("512".parse::<Budget>()?.bytes(), 512);
    /// assert_eq!("4g".parse::<Budget>()?.bytes(), 4 << 30);
    /// assert_eq!("2 MB".parse::<Budget>()?.bytes(), 2_000_000);
    /// assert_eq!("512KiB".parse::<Budget>()?.bytes(), 512 << 10);
    ///
    /// assert!("1.5".parse::<Budget>().is_err());
    /// assert!("4x".parse::<Budget>().is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = REGEX
            .captures(s)
            .ok_or_else(|| ParseError::Invalid(s.to_string()))?;

        let n = captures[1]
            .parse::<u64>()
            .map_err(|_| ParseError::Overflow(s.to_string()))?;

        let unit = captures[2].to_ascii_lowercase();
        let coefficient = coefficient(&unit).ok_or(ParseError::UnknownUnit(unit))?;

        n.checked_mul(coefficient)
            .map(Budget)
            .ok_or_else(|| ParseError::Overflow(s.to_string()))
    }
}

impl std::fmt::Display for Budget {
    /// Formats the budget as a human-readable, binary size.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::budget::Budget;
    ///
    /// assert_eq!(Budget::new(512).to_string(), "512 B");
    /// assert_eq!(Budget::new(1536 << 20).to_string(), "1.50 GiB");
    /// ```
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 1024 {
            return write!(f, "{} B", self.0);
        }

        let exponent = ((63 - self.0.leading_zeros()) / 10).min(UNITS.len() as u32 - 1);
        let value = self.0 as f64 / (1u64 << (10 * exponent)) as f64;

        write!(f, "{value:.2} {}", UNITS[exponent as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex() {
        assert!(REGEX.is_match("10 gb"));
    }

    #[test]
    fn test_units() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!("1k".parse::<Budget>()?.bytes(), 1024);
        assert_eq!("1KB".parse::<Budget>()?.bytes(), 1000);
        assert_eq!("1kib".parse::<Budget>()?.bytes(), 1024);
        assert_eq!("3 t".parse::<Budget>()?.bytes(), 3 << 40);
        assert_eq!("1eb".parse::<Budget>()?.bytes(), 10u64.pow(18));
        assert_eq!("1234".parse::<Budget>()?.bytes(), 1234);

        assert_eq!(
            "4x".parse::<Budget>().unwrap_err(),
            ParseError::UnknownUnit(String::from("x"))
        );
        assert_eq!(
            "".parse::<Budget>().unwrap_err(),
            ParseError::Invalid(String::new())
        );
        assert!(matches!(
            "100e".parse::<Budget>(),
            Err(ParseError::Overflow(_))
        ));

        Ok(())
    }

    #[test]
    fn test_display() {
        assert_eq!(Budget::new(0).to_string(), "0 B");
        assert_eq!(Budget::new(1023).to_string(), "1023 B");
        assert_eq!(Budget::new(1024).to_string(), "1.00 KiB");
        assert_eq!(Budget::new(4 << 30).to_string(), "4.00 GiB");
        assert_eq!(Budget::new(u64::MAX).to_string(), "16.00 EiB");
    }
}
