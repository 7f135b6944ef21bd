//! Locator match table and route codes.
//!
//! # Invariants
//! - Contract `i` owns collection code `i` and item code `ID_ROUTE_OFFSET + i`.
//! - Codes in `CUSTOM_ROUTE_MIN..=CUSTOM_ROUTE_MAX` are reserved for host
//!   routes and never collide with contract codes.
//! - When several patterns match, the one with the most literal segments
//!   wins; ties go to the earliest registration.

use crate::locator::Locator;

/// Offset added to a contract index to form its item route code.
pub const ID_ROUTE_OFFSET: u32 = 9999;
/// Lowest code of the custom route band.
pub const CUSTOM_ROUTE_MIN: u32 = 1000;
/// Highest code of the custom route band.
pub const CUSTOM_ROUTE_MAX: u32 = 8999;
/// Contract indexes must stay below the custom band.
pub const MAX_CONTRACTS: usize = CUSTOM_ROUTE_MIN as usize;

/// Integer classification of a matched locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteCode(u32);

/// Decoded meaning of a route code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Collection(usize),
    Item(usize),
    Custom(u32),
}

impl RouteCode {
    pub fn collection(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn item(index: usize) -> Self {
        Self(ID_ROUTE_OFFSET + index as u32)
    }

    /// Returns `None` outside the reserved custom band.
    pub fn custom(code: u32) -> Option<Self> {
        (CUSTOM_ROUTE_MIN..=CUSTOM_ROUTE_MAX)
            .contains(&code)
            .then_some(Self(code))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn kind(self) -> RouteKind {
        if self.0 >= ID_ROUTE_OFFSET {
            RouteKind::Item((self.0 - ID_ROUTE_OFFSET) as usize)
        } else if self.0 >= CUSTOM_ROUTE_MIN {
            RouteKind::Custom(self.0)
        } else {
            RouteKind::Collection(self.0 as usize)
        }
    }

    pub fn is_custom(self) -> bool {
        matches!(self.kind(), RouteKind::Custom(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    /// `*`: any one segment.
    Any,
    /// `#`: one segment of ASCII digits.
    Number,
}

impl PatternSegment {
    fn parse(value: &str) -> Self {
        match value {
            "*" => Self::Any,
            "#" => Self::Number,
            other => Self::Literal(other.to_string()),
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Literal(text) => text == segment,
            Self::Any => true,
            Self::Number => !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()),
        }
    }
}

#[derive(Debug, Clone)]
struct MatchEntry {
    authority: String,
    pattern: Vec<PatternSegment>,
    code: RouteCode,
}

impl MatchEntry {
    fn literal_count(&self) -> usize {
        self.pattern
            .iter()
            .filter(|segment| matches!(segment, PatternSegment::Literal(_)))
            .count()
    }

    fn matches(&self, locator: &Locator) -> bool {
        self.authority == locator.authority()
            && self.pattern.len() == locator.segments().len()
            && self
                .pattern
                .iter()
                .zip(locator.segments())
                .all(|(pattern, segment)| pattern.matches(segment))
    }
}

/// Ordered mapping of (authority, path pattern) to route code.
#[derive(Debug, Clone, Default)]
pub struct MatchTable {
    entries: Vec<MatchEntry>,
}

impl MatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` (slash-separated, `*`/`#` wildcards) under `authority`.
    ///
    /// Returns `false` when the exact same pattern is already registered.
    pub fn add(&mut self, authority: &str, path: &str, code: RouteCode) -> bool {
        let pattern: Vec<PatternSegment> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(PatternSegment::parse)
            .collect();
        let duplicate = self
            .entries
            .iter()
            .any(|entry| entry.authority == authority && entry.pattern == pattern);
        if duplicate {
            return false;
        }
        self.entries.push(MatchEntry {
            authority: authority.to_string(),
            pattern,
            code,
        });
        true
    }

    /// Returns the most specific route matching `locator`.
    pub fn route(&self, locator: &Locator) -> Option<RouteCode> {
        let mut best: Option<&MatchEntry> = None;
        for entry in self.entries.iter().filter(|entry| entry.matches(locator)) {
            match best {
                Some(current) if current.literal_count() >= entry.literal_count() => {}
                _ => best = Some(entry),
            }
        }
        best.map(|entry| entry.code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
