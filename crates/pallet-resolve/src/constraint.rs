//! Version constraints

use crate::version::Version;
use crate::{ResolveError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a [`Constraint::Compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A predicate over versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Constraint {
    /// `*`
    Any,
    /// `=V`, `!=V`, `<V`, `<=V`, `>V`, `>=V`, or a bare `V` (equality)
    Compare(Op, Version),
    /// `^V`: up to the next breaking change of the leftmost nonzero component
    Caret(Version),
    /// `~V`: up to the next minor, or next major when only a major was given
    Tilde(Version),
    /// `N.*` or `N.M.*`
    Pattern { major: u64, minor: Option<u64> },
}

impl Constraint {
    /// Parse constraint text
    pub fn parse(text: &str) -> Result<Self> {
        let s = text.trim();
        if s.is_empty() || s == "*" {
            return Ok(Constraint::Any);
        }

        if let Some(rest) = s.strip_prefix('^') {
            return Ok(Constraint::Caret(parse_target(text, rest)?));
        }
        if let Some(rest) = s.strip_prefix('~') {
            return Ok(Constraint::Tilde(parse_target(text, rest)?));
        }
        if let Some(prefix) = s.strip_suffix(".*") {
            return parse_pattern(text, prefix);
        }

        // Two-character operators first so "<=" is not read as "<"
        const OPERATORS: [(&str, Op); 10] = [
            ("==", Op::Eq),
            ("!=", Op::Ne),
            ("<=", Op::Le),
            (">=", Op::Ge),
            ("≠", Op::Ne),
            ("≤", Op::Le),
            ("≥", Op::Ge),
            ("=", Op::Eq),
            ("<", Op::Lt),
            (">", Op::Gt),
        ];
        for (token, op) in OPERATORS {
            if let Some(rest) = s.strip_prefix(token) {
                return Ok(Constraint::Compare(op, parse_target(text, rest)?));
            }
        }

        // A bare version means exact equality
        Ok(Constraint::Compare(Op::Eq, parse_target(text, s)?))
    }

    /// Whether `version` satisfies this constraint
    ///
    /// Range bounds come from the constraint's own target, never from the
    /// tested version.
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Compare(op, target) => {
                let ord = version.cmp(target);
                match op {
                    Op::Eq => ord == Ordering::Equal,
                    Op::Ne => ord != Ordering::Equal,
                    Op::Lt => ord == Ordering::Less,
                    Op::Le => ord != Ordering::Greater,
                    Op::Gt => ord == Ordering::Greater,
                    Op::Ge => ord != Ordering::Less,
                }
            }
            Constraint::Caret(target) => version >= target && below(version, caret_upper(target)),
            Constraint::Tilde(target) => version >= target && below(version, tilde_upper(target)),
            Constraint::Pattern { major, minor } => {
                version.major == *major && minor.map_or(true, |m| version.minor == m)
            }
        }
    }

    /// Alias of [`Constraint::satisfies`]
    pub fn matches(&self, version: &Version) -> bool {
        self.satisfies(version)
    }
}

fn parse_target(text: &str, rest: &str) -> Result<Version> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(ResolveError::InvalidConstraint {
            text: text.to_string(),
            reason: "missing version".to_string(),
        });
    }
    Version::parse(rest).map_err(|_| ResolveError::InvalidConstraint {
        text: text.to_string(),
        reason: format!("'{}' is not a version", rest),
    })
}

fn parse_pattern(text: &str, prefix: &str) -> Result<Constraint> {
    let invalid = || ResolveError::InvalidConstraint {
        text: text.to_string(),
        reason: "wildcard patterns are N.* or N.M.*".to_string(),
    };

    let mut parts = prefix.split('.');
    let major = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(invalid)?;
    let minor = match parts.next() {
        Some(p) => Some(p.parse().map_err(|_| invalid())?),
        None => None,
    };
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(Constraint::Pattern { major, minor })
}

/// `None` means the bound would not fit in a `u64` component
fn below(version: &Version, upper: Option<Version>) -> bool {
    upper.map_or(true, |upper| *version < upper)
}

/// Exclusive upper bound of `^target`
fn caret_upper(target: &Version) -> Option<Version> {
    let precision = target.precision();
    if target.major > 0 || precision == 1 {
        Some(Version::new(target.major.checked_add(1)?, 0, 0))
    } else if target.minor > 0 || precision == 2 {
        Some(Version::new(0, target.minor.checked_add(1)?, 0))
    } else {
        Some(Version::new(0, 0, target.patch.checked_add(1)?))
    }
}

/// Exclusive upper bound of `~target`
fn tilde_upper(target: &Version) -> Option<Version> {
    if target.precision() == 1 {
        Some(Version::new(target.major.checked_add(1)?, 0, 0))
    } else {
        Some(Version::new(target.major, target.minor.checked_add(1)?, 0))
    }
}

/// Highest candidate satisfying `constraint`
///
/// Linear scan keeping the running maximum; among equal-ordering candidates
/// the first one encountered wins, so callers must pass candidates in a
/// stable order.
pub fn highest_satisfying<T: AsRef<Version>>(
    candidates: impl IntoIterator<Item = T>,
    constraint: &Constraint,
) -> Option<T> {
    let mut best: Option<T> = None;
    for candidate in candidates {
        if !constraint.satisfies(candidate.as_ref()) {
            continue;
        }
        let replace = match &best {
            Some(current) => candidate.as_ref() > current.as_ref(),
            None => true,
        };
        if replace {
            best = Some(candidate);
        }
    }
    best
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => f.write_str("*"),
            Constraint::Compare(op, v) => write!(f, "{}{}", op, v),
            Constraint::Caret(v) => write!(f, "^{}", v),
            Constraint::Tilde(v) => write!(f, "~{}", v),
            Constraint::Pattern {
                major,
                minor: Some(minor),
            } => write!(f, "{}.{}.*", major, minor),
            Constraint::Pattern { major, minor: None } => write!(f, "{}.*", major),
        }
    }
}

impl FromStr for Constraint {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        Constraint::parse(s)
    }
}

impl TryFrom<String> for Constraint {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self> {
        Constraint::parse(&value)
    }
}

impl From<Constraint> for String {
    fn from(constraint: Constraint) -> Self {
        constraint.to_string()
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint::Any
    }
}
