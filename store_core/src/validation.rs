//! Identifier validation
//!
//! Column and table names end up interpolated into SQL text (values never do), so every
//! identifier the PostgreSQL engine renders goes through [`ValidatedIdentifier`] first.
//! Filter fields that are not in the record's column map are passed through unresolved,
//! which makes this the only barrier between caller input and generated SQL.

use std::fmt;

/// Why a name was rejected as an SQL identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Name (or one of its dotted segments) is empty
    Empty,
    /// Segment is longer than PostgreSQL's identifier limit
    TooLong {
        name: String,
        length: usize,
        max_length: usize,
    },
    /// Segment must start with a letter or underscore
    InvalidStartCharacter(String),
    /// Only ASCII alphanumerics and underscores are allowed
    InvalidCharacters(String),
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierError::Empty => write!(f, "identifier cannot be empty"),
            IdentifierError::TooLong {
                name,
                length,
                max_length,
            } => write!(
                f,
                "identifier '{}' is too long: {} characters (max {})",
                name, length, max_length
            ),
            IdentifierError::InvalidStartCharacter(name) => {
                write!(f, "identifier '{}' must start with a letter or underscore", name)
            }
            IdentifierError::InvalidCharacters(name) => write!(
                f,
                "identifier '{}' may only contain alphanumeric characters and underscores",
                name
            ),
        }
    }
}

impl std::error::Error for IdentifierError {}

/// A table or column name that is safe to quote into SQL.
///
/// Qualified names (`posts.author_id`) are accepted; each segment is validated and
/// quoted separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedIdentifier(String);

impl ValidatedIdentifier {
    /// PostgreSQL identifier length limit
    pub const MAX_LENGTH: usize = 63;

    pub fn new(name: &str) -> Result<Self, IdentifierError> {
        if name.is_empty() {
            return Err(IdentifierError::Empty);
        }
        for segment in name.split('.') {
            Self::validate_segment(segment)?;
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form, segment by segment
    pub fn quoted(&self) -> String {
        self.0
            .split('.')
            .map(|segment| format!("\"{}\"", segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn validate_segment(segment: &str) -> Result<(), IdentifierError> {
        let first = segment.chars().next().ok_or(IdentifierError::Empty)?;

        if segment.len() > Self::MAX_LENGTH {
            return Err(IdentifierError::TooLong {
                name: segment.to_string(),
                length: segment.len(),
                max_length: Self::MAX_LENGTH,
            });
        }

        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(IdentifierError::InvalidStartCharacter(segment.to_string()));
        }

        if !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(IdentifierError::InvalidCharacters(segment.to_string()));
        }

        Ok(())
    }
}

impl fmt::Display for ValidatedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate and quote in one step
pub fn quote_identifier(name: &str) -> Result<String, IdentifierError> {
    ValidatedIdentifier::new(name).map(|ident| ident.quoted())
}
