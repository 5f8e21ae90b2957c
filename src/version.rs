//! Version parsing and comparison, plus the constraint algebra used to
//! evaluate cookbook version requirements.
//!
//! Follows semantic-versioning ordering with an additional "pessimistic"
//! constraint operator (`~>`) whose upper bound depends on how many
//! segments the user wrote.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("invalid constraint '{0}'")]
    InvalidConstraint(String),
}

/// A semantic version: major.minor.patch with optional prerelease and build
/// metadata. Immutable once constructed.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl Version {
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    #[must_use]
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// Parse a version string, accepting an optional leading `v`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidVersion`] if any numeric segment is
    /// non-numeric or the string is empty.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let s = input.trim();
        let s = s.strip_prefix(['v', 'V']).unwrap_or(s);
        if s.is_empty() {
            return Err(VersionError::InvalidVersion(input.to_string()));
        }

        // Split off build metadata first (+...), then prerelease (-...).
        let (core_and_pre, build) = match s.split_once('+') {
            Some((left, right)) => (left, Some(right.to_string())),
            None => (s, None),
        };

        let (core, prerelease) = match core_and_pre.split_once('-') {
            Some((left, right)) => (left, Some(right.to_string())),
            None => (core_and_pre, None),
        };

        let mut segments = core.split('.');
        let major = parse_segment(segments.next(), input)?;
        let minor = match segments.next() {
            Some(s) => parse_segment(Some(s), input)?,
            None => 0,
        };
        let patch = match segments.next() {
            Some(s) => parse_segment(Some(s), input)?,
            None => 0,
        };
        if segments.next().is_some() {
            return Err(VersionError::InvalidVersion(input.to_string()));
        }

        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }

    /// Three-way comparison per semantic-versioning ordering.
    ///
    /// Compares majors, then minors, then patches; a version carrying a
    /// prerelease identifier sorts strictly below the same triple without
    /// one, and between two prereleases comparison is lexicographic.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }

    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The next version bumping only the major segment, zeroing the rest.
    #[must_use]
    pub const fn next_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// The next version bumping only the minor segment, zeroing patch.
    #[must_use]
    pub const fn next_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }
}

fn parse_segment(segment: Option<&str>, original: &str) -> Result<u64, VersionError> {
    segment
        .ok_or_else(|| VersionError::InvalidVersion(original.to_string()))?
        .parse::<u64>()
        .map_err(|_| VersionError::InvalidVersion(original.to_string()))
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A version constraint operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Pessimistic,
}

impl Operator {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Pessimistic => "~>",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single version constraint, e.g. `~> 2.0` or `>= 1.2.3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub operator: Operator,
    pub version: Version,
    /// For `Pessimistic`, the exclusive upper bound computed from how many
    /// segments the user wrote (see `spec.md` §3's table).
    upper_bound: Option<Version>,
}

impl Constraint {
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self {
            operator: Operator::Eq,
            version,
            upper_bound: None,
        }
    }

    /// Parse a single constraint, e.g. `"~> 2.0"`, `">= 1.0.0"`, `"= 1.2.3"`.
    ///
    /// An empty string parses to "any version" (`>= 0.0.0`). Ruby-style
    /// `==` is normalized to `=`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidConstraint`] if the operator is
    /// unrecognized or the version segment fails to parse.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let s = input.trim();
        if s.is_empty() {
            return Ok(Self {
                operator: Operator::Ge,
                version: Version::new(0, 0, 0),
                upper_bound: None,
            });
        }

        let (op_str, rest) = split_operator(s)
            .ok_or_else(|| VersionError::InvalidConstraint(input.to_string()))?;
        let version_str = rest.trim();
        let segment_count = count_segments(version_str);

        match op_str {
            "==" | "=" => {
                let version = Version::parse(version_str)
                    .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?;
                Ok(Self {
                    operator: Operator::Eq,
                    version,
                    upper_bound: None,
                })
            }
            "!=" => Ok(Self {
                operator: Operator::Ne,
                version: Version::parse(version_str)
                    .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?,
                upper_bound: None,
            }),
            ">" => Ok(Self {
                operator: Operator::Gt,
                version: Version::parse(version_str)
                    .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?,
                upper_bound: None,
            }),
            "<" => Ok(Self {
                operator: Operator::Lt,
                version: Version::parse(version_str)
                    .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?,
                upper_bound: None,
            }),
            ">=" => Ok(Self {
                operator: Operator::Ge,
                version: Version::parse(version_str)
                    .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?,
                upper_bound: None,
            }),
            "<=" => Ok(Self {
                operator: Operator::Le,
                version: Version::parse(version_str)
                    .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?,
                upper_bound: None,
            }),
            "~>" => {
                let version = Version::parse(version_str)
                    .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?;
                let upper_bound = pessimistic_upper_bound(&version, segment_count);
                Ok(Self {
                    operator: Operator::Pessimistic,
                    version,
                    upper_bound: Some(upper_bound),
                })
            }
            _ => Err(VersionError::InvalidConstraint(input.to_string())),
        }
    }

    /// Whether `version` satisfies this constraint.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        use Ordering::{Equal, Greater, Less};
        match self.operator {
            Operator::Eq => version.compare(&self.version) == Equal,
            Operator::Ne => version.compare(&self.version) != Equal,
            Operator::Gt => version.compare(&self.version) == Greater,
            Operator::Lt => version.compare(&self.version) == Less,
            Operator::Ge => version.compare(&self.version) != Less,
            Operator::Le => version.compare(&self.version) != Greater,
            Operator::Pessimistic => {
                let upper = self
                    .upper_bound
                    .as_ref()
                    .expect("pessimistic constraint always carries an upper bound");
                version.compare(&self.version) != Less && version.compare(upper) == Less
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator, self.version)
    }
}

/// Count how many dot-separated numeric segments the user actually wrote,
/// ignoring any prerelease/build suffix. Used to pick the pessimistic
/// operator's precision per `spec.md` §3's table.
fn count_segments(version_str: &str) -> usize {
    let core = version_str
        .split(['-', '+'])
        .next()
        .unwrap_or(version_str);
    core.split('.').filter(|s| !s.is_empty()).count()
}

fn pessimistic_upper_bound(version: &Version, segment_count: usize) -> Version {
    match segment_count {
        0 | 1 => version.next_major(),
        2 => version.next_major(),
        _ => version.next_minor(),
    }
}

fn split_operator(s: &str) -> Option<(&str, &str)> {
    for op in ["~>", ">=", "<=", "==", "!=", ">", "<", "="] {
        if let Some(rest) = s.strip_prefix(op) {
            return Some((op, rest));
        }
    }
    // No operator: treat as exact version.
    Some(("=", s))
}

/// A conjunction of [`Constraint`]s; a version satisfies the set iff it
/// satisfies every member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    pub constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// Parse a comma-separated constraint set, e.g. `">= 1.0, < 2.0"`.
    ///
    /// # Errors
    ///
    /// Returns an error if any member constraint fails to parse.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if input.trim().is_empty() {
            return Ok(Self {
                constraints: vec![Constraint::parse("")?],
            });
        }
        let constraints = input
            .split(',')
            .map(Constraint::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { constraints })
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }

    #[must_use]
    pub fn any() -> Self {
        Self {
            constraints: vec![Constraint::parse("").expect("empty constraint always parses")],
        }
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .constraints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{rendered}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parsing {
        use super::*;

        #[test]
        fn basic_triple() {
            let v = Version::parse("1.2.3").unwrap();
            assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        }

        #[test]
        fn leading_v() {
            let v = Version::parse("v2.0.0").unwrap();
            assert_eq!((v.major, v.minor, v.patch), (2, 0, 0));
        }

        #[test]
        fn missing_segments_default_to_zero() {
            let v = Version::parse("3").unwrap();
            assert_eq!((v.major, v.minor, v.patch), (3, 0, 0));
        }

        #[test]
        fn prerelease_and_build() {
            let v = Version::parse("1.0.0-beta.1+build5").unwrap();
            assert_eq!(v.prerelease.as_deref(), Some("beta.1"));
            assert_eq!(v.build.as_deref(), Some("build5"));
        }

        #[test]
        fn rejects_non_numeric() {
            assert!(Version::parse("1.x.0").is_err());
            assert!(Version::parse("").is_err());
        }
    }

    mod ordering {
        use super::*;

        #[test]
        fn reflexive() {
            let v = Version::parse("1.2.3").unwrap();
            assert_eq!(v.compare(&v), Ordering::Equal);
        }

        #[test]
        fn antisymmetric() {
            let a = Version::parse("1.0.0").unwrap();
            let b = Version::parse("2.0.0").unwrap();
            assert_eq!(a.compare(&b), Ordering::Less);
            assert_eq!(b.compare(&a), Ordering::Greater);
        }

        #[test]
        fn transitive() {
            let a = Version::parse("1.0.0").unwrap();
            let b = Version::parse("1.5.0").unwrap();
            let c = Version::parse("2.0.0").unwrap();
            assert!(a < b);
            assert!(b < c);
            assert!(a < c);
        }

        #[test]
        fn prerelease_sorts_below_release() {
            let pre = Version::parse("1.0.0-rc1").unwrap();
            let release = Version::parse("1.0.0").unwrap();
            assert!(pre < release);
        }

        #[test]
        fn prerelease_lexicographic() {
            let a = Version::parse("1.0.0-alpha").unwrap();
            let b = Version::parse("1.0.0-beta").unwrap();
            assert!(a < b);
        }
    }

    mod constraints {
        use super::*;

        #[test]
        fn empty_is_any_version() {
            let c = ConstraintSet::parse("").unwrap();
            assert!(c.matches(&Version::new(0, 0, 0)));
            assert!(c.matches(&Version::new(999, 0, 0)));
        }

        #[test]
        fn double_equals_normalizes() {
            let c = Constraint::parse("== 1.2.3").unwrap();
            assert_eq!(c.operator, Operator::Eq);
        }

        #[test]
        fn pessimistic_patch_precision() {
            let c = Constraint::parse("~> 1.2.3").unwrap();
            assert!(c.matches(&Version::new(1, 2, 3)));
            assert!(c.matches(&Version::new(1, 2, 9)));
            assert!(!c.matches(&Version::new(1, 3, 0)));
            assert!(!c.matches(&Version::new(2, 0, 0)));
        }

        #[test]
        fn pessimistic_minor_precision() {
            let c = Constraint::parse("~> 1.2").unwrap();
            assert!(c.matches(&Version::new(1, 2, 0)));
            assert!(c.matches(&Version::new(1, 9, 9)));
            assert!(!c.matches(&Version::new(2, 0, 0)));
        }

        #[test]
        fn pessimistic_major_precision() {
            let c = Constraint::parse("~> 2").unwrap();
            assert!(c.matches(&Version::new(2, 5, 0)));
            assert!(!c.matches(&Version::new(3, 0, 0)));
        }

        #[test]
        fn pessimistic_two_zero() {
            let c = Constraint::parse("~> 2.0").unwrap();
            assert!(c.matches(&Version::new(2, 0, 0)));
            assert!(c.matches(&Version::new(2, 10, 0)));
            assert!(!c.matches(&Version::new(3, 0, 0)));
            assert!(!c.matches(&Version::new(1, 9, 9)));
        }

        #[test]
        fn pessimistic_two_zero_zero() {
            let c = Constraint::parse("~> 2.0.0").unwrap();
            assert!(c.matches(&Version::new(2, 0, 99)));
            assert!(!c.matches(&Version::new(2, 1, 0)));
        }

        #[test]
        fn set_conjunction() {
            let set = ConstraintSet::parse(">= 1.0, < 2.0").unwrap();
            assert!(set.matches(&Version::new(1, 5, 0)));
            assert!(!set.matches(&Version::new(2, 0, 0)));
            assert!(!set.matches(&Version::new(0, 9, 0)));
        }

        #[test]
        fn not_equal() {
            let c = Constraint::parse("!= 1.0.0").unwrap();
            assert!(!c.matches(&Version::new(1, 0, 0)));
            assert!(c.matches(&Version::new(1, 0, 1)));
        }

        #[test]
        fn no_operator_is_exact() {
            let c = Constraint::parse("1.2.3").unwrap();
            assert_eq!(c.operator, Operator::Eq);
            assert!(c.matches(&Version::new(1, 2, 3)));
        }
    }
}
