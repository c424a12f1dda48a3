//! Version constraints and version selection.
//!
//! A [`VersionSpec`] is what a manifest writes next to a dependency name or a base
//! target name:
//!
//! | Text                                   | Variant                     |
//! |----------------------------------------|-----------------------------|
//! | `""`, `*`, `latest`                    | [`VersionSpec::Any`]        |
//! | `1.2.3`, `v1.2.3`                      | [`VersionSpec::Exact`]      |
//! | `^1.2`, `~0.3.1`, `>=1.0.0, <2.0.0`    | [`VersionSpec::Range`]      |
//! | `owner/project`, `git@host:p.git#v1.0` | [`VersionSpec::RemotePin`]  |
//!
//! Note that a bare version is an exact requirement here, unlike Cargo where `1.2.3`
//! means `^1.2.3`.
//!
//! # Selection
//!
//! [`VersionSpec::select`] returns the highest semantic version satisfying the spec.
//! Refs never take part in selection since they have no order. A remote pin never
//! consults the candidate set: it resolves to its literal ref.

use std::fmt;

use crate::constants::DEFAULT_BRANCH_REF;
use crate::core::EmbpmError;
use crate::locator::{Locator, RepositoryAddress};
use crate::version::{Version, VersionOrdering};

/// A constraint used to pick one [`Version`] out of the available ones.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionSpec {
    /// Exactly this version (precedence equality)
    Exact(Version),
    /// A semver comparator set
    Range(semver::VersionReq),
    /// Any version, prereleases included
    Any,
    /// A repository location with an optional `#ref`, bypassing name lookup
    RemotePin(Locator),
}

impl VersionSpec {
    /// Parse a spec string. Never performs I/O.
    pub fn parse(text: &str) -> Result<Self, EmbpmError> {
        let trimmed = text.trim();

        if trimmed.is_empty() || trimmed == "*" || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Self::Any);
        }

        if RepositoryAddress::looks_like(trimmed) {
            return Locator::parse(trimmed).map(Self::RemotePin);
        }

        if let Ok(version) = Version::parse(trimmed) {
            return Ok(Self::Exact(version));
        }

        semver::VersionReq::parse(trimmed)
            .map(Self::Range)
            .map_err(|e| EmbpmError::parse("version spec", text, e.to_string()))
    }

    /// Whether `version` satisfies this spec.
    ///
    /// A pin with a fragment is satisfied by the version its fragment names (either
    /// the identical ref or an equal semantic version); a pin without a fragment is
    /// satisfied by any version of its repository.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(expected) => expected.compare(version) == VersionOrdering::Equal,
            Self::Range(req) => version.as_semver().is_some_and(|v| req.matches(v)),
            Self::Any => true,
            Self::RemotePin(locator) => match locator.fragment() {
                None => true,
                Some(fragment) => match Self::parse(fragment) {
                    Ok(Self::RemotePin(_)) | Err(_) => version == &Version::from_ref(fragment),
                    Ok(inner) => inner.matches(version),
                },
            },
        }
    }

    /// Pick the highest version satisfying the spec, or `None` when nothing does.
    ///
    /// Remote pins short-circuit to their literal ref (the default branch when the pin
    /// carries no fragment).
    #[must_use]
    pub fn select(&self, versions: &[Version]) -> Option<Version> {
        if let Self::RemotePin(locator) = self {
            return Some(Version::from_ref(locator.fragment().unwrap_or(DEFAULT_BRANCH_REF)));
        }

        highest(versions.iter().filter(|v| v.as_semver().is_some() && self.matches(v)))
    }

    #[must_use]
    pub fn is_pin(&self) -> bool {
        matches!(self, Self::RemotePin(_))
    }

    /// The locator of a remote pin.
    #[must_use]
    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Self::RemotePin(locator) => Some(locator),
            _ => None,
        }
    }
}

fn highest<'a>(versions: impl Iterator<Item = &'a Version>) -> Option<Version> {
    let mut best: Option<&Version> = None;
    for candidate in versions {
        best = match best {
            Some(current) if candidate.compare(current) != VersionOrdering::Greater => Some(current),
            _ => Some(candidate),
        };
    }
    best.cloned()
}

impl Default for VersionSpec {
    fn default() -> Self {
        Self::Any
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(version) => write!(f, "{version}"),
            Self::Range(req) => write!(f, "{req}"),
            Self::Any => write!(f, "*"),
            Self::RemotePin(locator) => write!(f, "{locator}"),
        }
    }
}

impl std::str::FromStr for VersionSpec {
    type Err = EmbpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
