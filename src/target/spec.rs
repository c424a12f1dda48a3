//! Target spec strings: `name[,version-spec-or-url]`.
//!
//! A target spec names a build target and, optionally, which version or location of
//! it to use. The second component takes one of three shapes:
//!
//! - owner/project shorthand: `frdm-k64f-gcc,ARMmbed/target-frdm-k64f-gcc`
//! - a scheme URL, optionally `user@` prefixed: `k64f,git+ssh://host/k64f.git`
//! - a version or wildcard token: `k64f,0.1.*`, `k64f,*`
//!
//! [`parse_target_spec`] is the validator used before anything is persisted;
//! [`TargetSpec::parse`] reads back values that were already validated.

use regex::Regex;
use std::fmt;

use crate::core::EmbpmError;
use crate::version::VersionSpec;

const NAME_PATTERN: &str = r"^[a-z]+[a-z0-9+-]*$";
const OWNER_PROJECT_PATTERN: &str = r"^[a-zA-Z0-9-]+/[a-zA-Z0-9-]+$";
const URL_PATTERN: &str = r"^(?:[a-zA-Z0-9_-]*@)?[a-zA-Z0-9_+-]+://.*$";
const VERSION_TOKEN_PATTERN: &str = r"^[a-z0-9.*-]*$";

/// Which alternative of the grammar a spec string matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSpecShape {
    /// `name` alone
    BareName,
    /// `name,owner/project`
    OwnerProject,
    /// `name,scheme://...`
    Url,
    /// `name,1.2.3`, `name,*`, `name,`
    VersionToken,
}

/// A validated target spec string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTargetSpec {
    pub name: String,
    pub shape: TargetSpecShape,
    /// The text after the comma, if there was one
    pub requirement: Option<String>,
}

impl ParsedTargetSpec {
    /// Form written to `build.target`: an omitted requirement becomes `*`.
    #[must_use]
    pub fn to_persisted(&self) -> String {
        match &self.requirement {
            Some(requirement) => format!("{},{requirement}", self.name),
            None => format!("{},*", self.name),
        }
    }

    pub fn to_target_spec(&self) -> Result<TargetSpec, EmbpmError> {
        let requirement = match &self.requirement {
            Some(text) => VersionSpec::parse(text)?,
            None => VersionSpec::Any,
        };
        Ok(TargetSpec {
            name: self.name.clone(),
            requirement,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, EmbpmError> {
    Regex::new(pattern).map_err(|e| EmbpmError::Other {
        message: format!("invalid target spec pattern: {e}"),
    })
}

/// Validate a target spec string and classify its shape.
///
/// The requirement part must also be a usable version spec, so `k64f,abc` is
/// rejected even though `abc` fits the token alphabet.
///
/// # Errors
///
/// Returns [`EmbpmError::ParseError`] naming the branch that rejected the input.
pub fn parse_target_spec(text: &str) -> Result<ParsedTargetSpec, EmbpmError> {
    let reject = |reason: &str| EmbpmError::parse("target spec", text, reason);

    let (name, requirement) = match text.split_once(',') {
        Some((name, requirement)) => (name, Some(requirement)),
        None => (text, None),
    };

    if !compile(NAME_PATTERN)?.is_match(name) {
        return Err(reject(
            "target names start with a lowercase letter and contain only lowercase letters, digits, '+' and '-'",
        ));
    }

    let shape = match requirement {
        None => TargetSpecShape::BareName,
        Some(req) if compile(OWNER_PROJECT_PATTERN)?.is_match(req) => TargetSpecShape::OwnerProject,
        Some(req) if compile(URL_PATTERN)?.is_match(req) => TargetSpecShape::Url,
        Some(req) if compile(VERSION_TOKEN_PATTERN)?.is_match(req) => TargetSpecShape::VersionToken,
        Some(_) => {
            return Err(reject("expected owner/project, a URL, or a version after the comma"));
        }
    };

    let parsed = ParsedTargetSpec {
        name: name.to_string(),
        shape,
        requirement: requirement.map(str::to_string),
    };
    parsed.to_target_spec().map_err(|e| match e {
        EmbpmError::ParseError {
            reason,
            ..
        } => reject(&reason),
        other => other,
    })?;
    Ok(parsed)
}

/// A target name plus the requirement it must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub name: String,
    pub requirement: VersionSpec,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, requirement: VersionSpec) -> Self {
        Self {
            name: name.into(),
            requirement,
        }
    }

    /// Read a persisted `name[,requirement]` value.
    pub fn parse(text: &str) -> Result<Self, EmbpmError> {
        let text = text.trim();
        match text.split_once(',') {
            Some((name, requirement)) => Ok(Self::new(name.trim(), VersionSpec::parse(requirement)?)),
            None if !text.is_empty() => Ok(Self::new(text, VersionSpec::Any)),
            None => Err(EmbpmError::parse("target spec", text, "empty target name")),
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.name, self.requirement)
    }
}
