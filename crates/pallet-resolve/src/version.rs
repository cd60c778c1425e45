//! Package versions
//!
//! A version is `major[.minor[.patch]]` followed by an optional prerelease and
//! build metadata. Missing minor/patch components default to 0. Ordering
//! follows semantic-versioning precedence; build metadata never takes part in
//! ordering, equality or hashing.

use crate::{ResolveError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A parsed package version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Vec<Identifier>,
    pub build: Option<String>,
    original: String,
}

/// One dot-separated prerelease identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u64),
    AlphaNumeric(String),
}

impl Version {
    /// Build a release version from its numeric components
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: Vec::new(),
            build: None,
            original: format!("{}.{}.{}", major, minor, patch),
        }
    }

    /// Parse version text
    ///
    /// Only a leading numeric `major` is required. After the numeric core,
    /// `-` starts the prerelease and `+` the build metadata; any other
    /// trailing text (`1.0rc1`, `2.4_p1`) is read as prerelease text.
    /// That includes a fourth numeric component: `2.4.1.1` has prerelease
    /// `1` and sorts below `2.4.1`.
    pub fn parse(text: &str) -> Result<Self> {
        let original = text.trim();
        let (core, build) = match original.split_once('+') {
            Some((core, build)) => (core, Some(build.to_string())),
            None => (original, None),
        };

        let (numbers, rest) = split_numeric_core(core)
            .ok_or_else(|| ResolveError::MalformedVersion(text.to_string()))?;

        let mut components = [0u64; 3];
        for (slot, digits) in components.iter_mut().zip(&numbers) {
            *slot = digits
                .parse()
                .map_err(|_| ResolveError::MalformedVersion(text.to_string()))?;
        }

        let prerelease_text = rest.trim_start_matches(['-', '.', '_']);
        let prerelease = prerelease_text
            .split('.')
            .filter(|part| !part.is_empty())
            .map(Identifier::parse)
            .collect();

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
            prerelease,
            build: build.filter(|b| !b.is_empty()),
            original: original.to_string(),
        })
    }

    /// Number of numeric components written in the source text (1 to 3)
    pub fn precision(&self) -> usize {
        split_numeric_core(self.original.split('+').next().unwrap_or_default())
            .map(|(numbers, _)| numbers.len())
            .unwrap_or(3)
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Text this version was parsed from
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Three-way comparison returning -1, 0 or 1
    pub fn compare(&self, other: &Version) -> i8 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }
}

/// Split `1.2.3rest` into its numeric components and the remaining text
fn split_numeric_core(text: &str) -> Option<(Vec<&str>, &str)> {
    let mut numbers = Vec::with_capacity(3);
    let mut rest = text;

    loop {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            break;
        }
        numbers.push(&rest[..digits]);
        rest = &rest[digits..];

        let next_is_component = rest.starts_with('.')
            && rest[1..].bytes().next().is_some_and(|b| b.is_ascii_digit());
        if numbers.len() == 3 || !next_is_component {
            break;
        }
        rest = &rest[1..];
    }

    if numbers.is_empty() {
        None
    } else {
        Some((numbers, rest))
    }
}

impl Identifier {
    fn parse(part: &str) -> Self {
        if part.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = part.parse() {
                return Identifier::Numeric(n);
            }
        }
        Identifier::AlphaNumeric(part.to_string())
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::AlphaNumeric(_)) => Ordering::Less,
            (Identifier::AlphaNumeric(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::AlphaNumeric(a), Identifier::AlphaNumeric(b)) => {
                a.as_bytes().cmp(b.as_bytes())
            }
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::AlphaNumeric(s) => f.write_str(s),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (false, false) => Ordering::Equal,
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                // Slice ordering is pairwise, with a shorter prefix sorting first
                (true, true) => self.prerelease.cmp(&other.prerelease),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
    }
}

impl AsRef<Version> for Version {
    fn as_ref(&self) -> &Version {
        self
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl FromStr for Version {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.original
    }
}
