//! Versions and version constraints for EMBPM components and targets.
//!
//! Components and targets publish versions as git tags. A tag that parses as a
//! semantic version (optionally prefixed with `v`) becomes a [`Version::Semantic`];
//! anything else that must still be addressed (a branch, a commit, an arbitrary tag
//! used as a pin) is a [`Version::Ref`].
//!
//! # Ordering
//!
//! Semantic versions follow semver precedence: numeric identifiers compare
//! numerically, alphanumeric identifiers lexically, and a pre-release sorts below
//! its release. Refs are equal only to themselves and are
//! [`VersionOrdering::Incomparable`] with everything else, so `Version` implements
//! [`PartialOrd`] but not `Ord`.
//!
//! ```rust,no_run
//! use embpm_cli::version::{Version, VersionOrdering};
//!
//! let a = Version::parse("v1.2.3-beta.1").unwrap();
//! let b = Version::parse("1.2.3").unwrap();
//! assert_eq!(a.compare(&b), VersionOrdering::Less);
//! assert_eq!(a.to_string(), "1.2.3-beta.1");
//! ```
//!
//! See [`spec`] for constraints and selection.

pub mod spec;

pub use spec::VersionSpec;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::core::EmbpmError;

/// Result of comparing two [`Version`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrdering {
    Less,
    Equal,
    Greater,
    Incomparable,
}

impl From<Ordering> for VersionOrdering {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Self::Less,
            Ordering::Equal => Self::Equal,
            Ordering::Greater => Self::Greater,
        }
    }
}

/// A component or target version.
///
/// Equality and hashing follow precedence, so build metadata is ignored.
#[derive(Debug, Clone)]
pub enum Version {
    /// A semantic version; any tag prefix has been stripped
    Semantic(semver::Version),
    /// An opaque git ref (branch, commit, non-version tag)
    Ref(String),
}

impl Version {
    /// Parse a semantic version, accepting a leading `v` or `V`.
    pub fn parse(text: &str) -> Result<Self, EmbpmError> {
        let trimmed = text.trim();
        let stripped = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        semver::Version::parse(stripped)
            .map(Self::Semantic)
            .map_err(|e| EmbpmError::parse("version", text, e.to_string()))
    }

    /// Interpret a git tag: a semantic version when it parses, otherwise `None`.
    ///
    /// Used when enumerating repository tags, where unparseable tags are skipped.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::parse(tag).ok()
    }

    /// An opaque ref version.
    pub fn from_ref(reference: impl Into<String>) -> Self {
        Self::Ref(reference.into())
    }

    /// Compare under semver precedence; refs are only equal to identical refs.
    ///
    /// Build metadata does not take part in precedence.
    #[must_use]
    pub fn compare(&self, other: &Self) -> VersionOrdering {
        match (self, other) {
            (Self::Semantic(a), Self::Semantic(b)) => a.cmp_precedence(b).into(),
            (Self::Ref(a), Self::Ref(b)) if a == b => VersionOrdering::Equal,
            _ => VersionOrdering::Incomparable,
        }
    }

    #[must_use]
    pub fn as_semver(&self) -> Option<&semver::Version> {
        match self {
            Self::Semantic(version) => Some(version),
            Self::Ref(_) => None,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == VersionOrdering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Semantic(version) => {
                0u8.hash(state);
                version.major.hash(state);
                version.minor.hash(state);
                version.patch.hash(state);
                version.pre.hash(state);
            }
            Self::Ref(reference) => {
                1u8.hash(state);
                reference.hash(state);
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.compare(other) {
            VersionOrdering::Less => Some(Ordering::Less),
            VersionOrdering::Equal => Some(Ordering::Equal),
            VersionOrdering::Greater => Some(Ordering::Greater),
            VersionOrdering::Incomparable => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic(version) => write!(f, "{version}"),
            Self::Ref(reference) => write!(f, "{reference}"),
        }
    }
}

impl std::str::FromStr for Version {
    type Err = EmbpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
