//! Resource locators of the form `content://<authority>/<segment>[/...]`.
//!
//! # Invariants
//! - The authority is non-empty.
//! - Path segments never contain `/` and are never empty; redundant slashes
//!   are dropped while parsing.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Scheme shared by every locator.
pub const LOCATOR_SCHEME: &str = "content";

/// Trailing segment that addresses a collection's bulk-sync endpoint.
pub const SYNC_SEGMENT: &str = "sync";

/// Locator parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    UnsupportedScheme(String),
    MissingAuthority(String),
}

impl Display for LocatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedScheme(value) => {
                write!(f, "locator must use the `{LOCATOR_SCHEME}://` scheme: {value}")
            }
            Self::MissingAuthority(value) => write!(f, "locator has no authority: {value}"),
        }
    }
}

impl Error for LocatorError {}

/// Opaque address of a collection or a single item within the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    authority: String,
    segments: Vec<String>,
}

impl Locator {
    /// Parses a locator string.
    ///
    /// # Errors
    /// - `UnsupportedScheme` when the text does not start with `content://`.
    /// - `MissingAuthority` when nothing follows the scheme.
    pub fn parse(value: &str) -> Result<Self, LocatorError> {
        let trimmed = value.trim();
        let rest = trimmed
            .strip_prefix(LOCATOR_SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or_else(|| LocatorError::UnsupportedScheme(trimmed.to_string()))?;

        let mut parts = rest.split('/');
        let authority = parts.next().unwrap_or_default();
        if authority.is_empty() {
            return Err(LocatorError::MissingAuthority(trimmed.to_string()));
        }

        Ok(Self {
            authority: authority.to_string(),
            segments: parts
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    /// Builds `content://<authority>/<table>`.
    pub fn collection(authority: &str, table: &str) -> Self {
        Self {
            authority: authority.to_string(),
            segments: vec![table.to_string()],
        }
    }

    /// Returns a copy with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.segments.push(segment.into());
        child
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns whether this locator addresses a sync endpoint.
    pub fn is_sync(&self) -> bool {
        self.segments.len() > 1 && self.last_segment() == Some(SYNC_SEGMENT)
    }

    /// Returns whether `other` lies strictly below this locator.
    pub fn is_ancestor_of(&self, other: &Locator) -> bool {
        self.authority == other.authority
            && other.segments.len() > self.segments.len()
            && other.segments.starts_with(&self.segments)
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{LOCATOR_SCHEME}://{}", self.authority)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}
