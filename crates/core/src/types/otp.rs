//! One-time passcodes used for email verification and password resets.

use core::fmt;

use serde::Serialize;

/// Errors produced while validating an OTP entry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// Nothing was entered.
    #[error("enter the 6-digit code")]
    Empty,
    /// Fewer than six digits were entered.
    #[error("the code must have 6 digits (got {len})")]
    TooShort {
        /// Number of characters entered.
        len: usize,
    },
    /// More than six characters were entered.
    #[error("the code must have 6 digits (got {len})")]
    TooLong {
        /// Number of characters entered.
        len: usize,
    },
    /// A character other than 0-9 was entered.
    #[error("the code may only contain digits")]
    NonDigit,
}

/// A six-digit numeric code. Leading zeroes are significant.
///
/// ```
/// use souk_core::{Otp, OtpError};
///
/// assert_eq!(Otp::parse("004211").unwrap().as_str(), "004211");
/// assert_eq!(Otp::parse("4211"), Err(OtpError::TooShort { len: 4 }));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Otp(String);

impl Otp {
    /// Number of digits in a code.
    pub const LENGTH: usize = 6;

    /// Validate a code typed by the user. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an [`OtpError`] unless the input is exactly six ASCII digits.
    pub fn parse(input: &str) -> Result<Self, OtpError> {
        let code = input.trim();
        let len = code.chars().count();
        if len == 0 {
            return Err(OtpError::Empty);
        }
        if !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(OtpError::NonDigit);
        }
        if len < Self::LENGTH {
            return Err(OtpError::TooShort { len });
        }
        if len > Self::LENGTH {
            return Err(OtpError::TooLong { len });
        }
        Ok(Self(code.to_owned()))
    }

    /// The code as entered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are credentials; keep them out of logs.
impl fmt::Debug for Otp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Otp(******)")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(Otp::parse("123456").unwrap().as_str(), "123456");
        assert_eq!(Otp::parse(" 000001 ").unwrap().as_str(), "000001");
    }

    #[test]
    fn test_parse_short_and_long() {
        assert_eq!(Otp::parse("12345"), Err(OtpError::TooShort { len: 5 }));
        assert_eq!(Otp::parse("1234567"), Err(OtpError::TooLong { len: 7 }));
        assert_eq!(Otp::parse(""), Err(OtpError::Empty));
    }

    #[test]
    fn test_parse_non_digit() {
        assert_eq!(Otp::parse("12a456"), Err(OtpError::NonDigit));
        assert_eq!(Otp::parse("12 456"), Err(OtpError::NonDigit));
    }

    #[test]
    fn test_debug_hides_code() {
        let otp = Otp::parse("987654").unwrap();
        assert!(!format!("{otp:?}").contains("987654"));
        assert_eq!(serde_json::to_string(&otp).unwrap(), "\"987654\"");
    }
}
