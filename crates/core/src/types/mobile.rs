//! Mobile number type.
//!
//! Numbers are stored in E.164 form (`+919876543210`). Bare ten-digit Indian
//! numbers, `0`-prefixed trunk numbers and `91`-prefixed numbers are
//! normalized to `+91`.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Mobile`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MobileError {
    /// The input string is empty.
    #[error("mobile number cannot be empty")]
    Empty,
    /// The input contains characters other than digits, spaces, dashes and a leading `+`.
    #[error("mobile number contains invalid characters")]
    InvalidCharacters,
    /// The number of digits is outside the E.164 range.
    #[error("mobile number must have between 10 and 15 digits")]
    InvalidLength,
}

/// A mobile number in E.164 form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Mobile(String);

impl Mobile {
    /// Country calling code used for numbers entered without one.
    pub const DEFAULT_COUNTRY_CODE: &'static str = "91";

    /// Parse and normalize a mobile number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains letters or
    /// punctuation other than spaces/dashes/parentheses, or has a digit count
    /// outside 10..=15.
    pub fn parse(s: &str) -> Result<Self, MobileError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MobileError::Empty);
        }

        let (explicit_plus, rest) = trimmed
            .strip_prefix('+')
            .map_or((false, trimmed), |rest| (true, rest));

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' => {}
                _ => return Err(MobileError::InvalidCharacters),
            }
        }

        let normalized = if explicit_plus {
            digits
        } else if digits.len() == 10 {
            format!("{}{digits}", Self::DEFAULT_COUNTRY_CODE)
        } else if let Some(local) = digits.strip_prefix('0').filter(|d| d.len() == 10) {
            format!("{}{local}", Self::DEFAULT_COUNTRY_CODE)
        } else {
            digits
        };

        if !(10..=15).contains(&normalized.len()) {
            return Err(MobileError::InvalidLength);
        }

        Ok(Self(format!("+{normalized}")))
    }

    /// Returns the E.164 string (including the leading `+`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last four digits, for masked display in logs.
    #[must_use]
    pub fn masked(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("******{tail}")
    }
}

impl fmt::Display for Mobile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Mobile {
    type Err = MobileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Mobile {
    type Error = MobileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Mobile> for String {
    fn from(mobile: Mobile) -> Self {
        mobile.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_indian_number_gets_country_code() {
        let m = Mobile::parse("98765 43210").unwrap();
        assert_eq!(m.as_str(), "+919876543210");
    }

    #[test]
    fn test_trunk_prefix_is_replaced() {
        let m = Mobile::parse("09876543210").unwrap();
        assert_eq!(m.as_str(), "+919876543210");
    }

    #[test]
    fn test_country_code_without_plus() {
        let m = Mobile::parse("919876543210").unwrap();
        assert_eq!(m.as_str(), "+919876543210");
    }

    #[test]
    fn test_explicit_international_number_is_kept() {
        let m = Mobile::parse("+1 (415) 555-0100").unwrap();
        assert_eq!(m.as_str(), "+14155550100");
    }

    #[test]
    fn test_rejects_letters_and_bad_lengths() {
        assert_eq!(Mobile::parse(""), Err(MobileError::Empty));
        assert_eq!(
            Mobile::parse("98765abc10"),
            Err(MobileError::InvalidCharacters)
        );
        assert_eq!(Mobile::parse("12345"), Err(MobileError::InvalidLength));
        assert_eq!(
            Mobile::parse("+1234567890123456"),
            Err(MobileError::InvalidLength)
        );
    }

    #[test]
    fn test_masked() {
        let m = Mobile::parse("9876543210").unwrap();
        assert_eq!(m.masked(), "******3210");
    }
}
