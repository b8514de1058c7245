//! Login names.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username is required")]
    Empty,
    #[error("username must be at most {max} characters")]
    TooLong { max: usize },
    #[error("username cannot contain control characters")]
    ControlCharacter,
}

/// A validated, trimmed login name.
///
/// ```
/// use cloudmart_core::Username;
///
/// let name = Username::parse("  alice ").unwrap();
/// assert_eq!(name.as_str(), "alice");
/// assert!(Username::parse("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Matches the `varchar(100)` column.
    pub const MAX_LENGTH: usize = 100;

    /// # Errors
    ///
    /// Returns an error for blank input, input longer than
    /// [`Self::MAX_LENGTH`] characters, or input containing control
    /// characters.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(UsernameError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if trimmed.chars().any(char::is_control) {
            return Err(UsernameError::ControlCharacter);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        assert_eq!(Username::parse(" bob\t").map(Username::into_inner), Ok("bob".to_owned()));
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert_eq!(Username::parse("   "), Err(UsernameError::Empty));
    }

    #[test]
    fn test_parse_length_limit() {
        assert!(Username::parse(&"a".repeat(100)).is_ok());
        assert_eq!(
            Username::parse(&"a".repeat(101)),
            Err(UsernameError::TooLong { max: 100 })
        );
    }

    #[test]
    fn test_parse_rejects_control_characters() {
        assert_eq!(
            Username::parse("ali\u{0}ce"),
            Err(UsernameError::ControlCharacter)
        );
    }
}
