//! Error handling for EMBPM
//!
//! This module provides the error type shared by every resolution operation and the
//! user-friendly rendering used by the CLI. The error system follows two principles:
//! 1. **One discriminated error type** ([`EmbpmError`]) with context fields, so callers
//!    can match on the failure kind instead of inspecting strings
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!    ([`ErrorContext`], [`user_friendly_error`])
//!
//! # Error Categories
//!
//! - **Parsing**: [`EmbpmError::ParseError`] - malformed version, spec, locator or
//!   target strings. Always local, no I/O attempted.
//! - **Selection**: [`EmbpmError::NoMatchingVersion`] - a constraint could not be
//!   satisfied by the available versions. Recoverable.
//! - **Remote access**: [`EmbpmError::RemoteFetchError`], [`EmbpmError::SourceNotFound`],
//!   [`EmbpmError::GitCloneFailed`], [`EmbpmError::GitCommandError`].
//! - **Graph shape**: [`EmbpmError::CyclicDependency`], [`EmbpmError::CyclicTargetChain`],
//!   [`EmbpmError::ConflictingRequirement`], [`EmbpmError::MissingTargetLink`].
//! - **Local state**: [`EmbpmError::ManifestNotFound`], [`EmbpmError::InvalidManifest`],
//!   [`EmbpmError::ConfigError`], [`EmbpmError::IoError`].
//!
//! Resolution walks never stop at the first error: the hierarchy resolver and the
//! installer collect every [`EmbpmError`] they meet into a list and return it next to
//! whatever partial result they built.
//!
//! # Examples
//!
//! ```rust,no_run
//! use embpm_cli::core::{EmbpmError, ErrorContext};
//!
//! let error = EmbpmError::SourceNotFound {
//!     name: "mbed-drivers".to_string(),
//! };
//! let context = ErrorContext::new(error)
//!     .with_suggestion("Add a [sources] entry for mbed-drivers");
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for EMBPM operations
///
/// Each variant carries the names and requirements needed to report the failure
/// without further lookups. Variants that describe a resolution outcome (rather than
/// an infrastructure failure) are collected into error lists by the walkers.
#[derive(Error, Debug)]
pub enum EmbpmError {
    /// A version, version spec, locator or target spec string was malformed
    #[error("Invalid {kind} '{input}': {reason}")]
    ParseError {
        /// What was being parsed ("version", "version spec", "locator", "target spec")
        kind: String,
        /// The offending input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// No available version satisfies the requirement
    #[error("No version of '{name}' matches '{requirement}' (available: {})", format_available(.available))]
    NoMatchingVersion {
        /// Component or target name
        name: String,
        /// The unsatisfied requirement, as written
        requirement: String,
        /// Versions that were considered
        available: Vec<String>,
    },

    /// Network, authentication or not-found failure talking to a repository
    #[error("Failed to fetch from {url}: {reason}")]
    RemoteFetchError {
        /// Repository URL
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// No repository is known for a name that is not pinned to a location
    #[error("No source configured for '{name}'")]
    SourceNotFound {
        /// The name that could not be located
        name: String,
    },

    /// A target in a hierarchy could not be resolved
    #[error("Target '{name}' ({requirement}) is missing{}", missing_suffix(.attempted))]
    MissingTargetLink {
        /// Target name
        name: String,
        /// The requirement the base link declared
        requirement: String,
        /// Whether a fetch was attempted before giving up
        attempted: bool,
    },

    /// The dependency graph loops back on itself
    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CyclicDependency {
        /// Names along the cycle, first and last equal
        chain: Vec<String>,
    },

    /// A target's base chain revisits a name
    #[error("Circular target inheritance detected: {}", .chain.join(" -> "))]
    CyclicTargetChain {
        /// Names along the cycle, first and last equal
        chain: Vec<String>,
    },

    /// Two dependents require incompatible versions of the same component
    #[error(
        "Conflicting requirements for '{name}': '{first_requirer}' requires {first_requirement}, \
         '{second_requirer}' requires {second_requirement}"
    )]
    ConflictingRequirement {
        /// Component name
        name: String,
        /// Component whose requirement was applied first
        first_requirer: String,
        /// Requirement applied first
        first_requirement: String,
        /// Component whose requirement could not be met
        second_requirer: String,
        /// Requirement that could not be met
        second_requirement: String,
    },

    /// No manifest exists where one was expected
    #[error("No manifest found at {path}")]
    ManifestNotFound {
        /// Path searched
        path: String,
    },

    /// A manifest exists but cannot be used
    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest {
        /// Manifest path
        path: String,
        /// Why it is invalid
        reason: String,
    },

    /// Git operation failed during execution
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g., "fetch", "checkout")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Repository cloning failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// Repository URL
        url: String,
        /// Error output from git
        reason: String,
    },

    /// Settings could not be read or written
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What went wrong
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

fn missing_suffix(attempted: &bool) -> &'static str {
    if *attempted { "" } else { " (not installed)" }
}

impl EmbpmError {
    /// Shorthand for [`EmbpmError::ParseError`].
    pub fn parse(kind: &str, input: &str, reason: impl Into<String>) -> Self {
        Self::ParseError {
            kind: kind.to_string(),
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Converts a failure from the git layer into a [`EmbpmError::RemoteFetchError`].
    ///
    /// The git command builder reports through `anyhow`; typed git errors are unwrapped
    /// so the reason carries git's own stderr instead of a generic message.
    pub fn remote(url: &str, error: &anyhow::Error) -> Self {
        let reason = match error.downcast_ref::<Self>() {
            Some(Self::GitCloneFailed {
                reason,
                ..
            }) => reason.trim().to_string(),
            Some(Self::GitCommandError {
                operation,
                stderr,
            }) => format!("git {operation}: {}", stderr.trim()),
            Some(Self::GitNotFound) => Self::GitNotFound.to_string(),
            _ => format!("{error:#}"),
        };
        Self::RemoteFetchError {
            url: url.to_string(),
            reason,
        }
    }

    /// The component or target name an error is about, when it names one.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::NoMatchingVersion {
                name,
                ..
            }
            | Self::SourceNotFound {
                name,
            }
            | Self::MissingTargetLink {
                name,
                ..
            }
            | Self::ConflictingRequirement {
                name,
                ..
            } => Some(name),
            Self::CyclicDependency {
                chain,
            }
            | Self::CyclicTargetChain {
                chain,
            } => chain.last().map(String::as_str),
            _ => None,
        }
    }
}

impl Clone for EmbpmError {
    fn clone(&self) -> Self {
        match self {
            Self::ParseError {
                kind,
                input,
                reason,
            } => Self::ParseError {
                kind: kind.clone(),
                input: input.clone(),
                reason: reason.clone(),
            },
            Self::NoMatchingVersion {
                name,
                requirement,
                available,
            } => Self::NoMatchingVersion {
                name: name.clone(),
                requirement: requirement.clone(),
                available: available.clone(),
            },
            Self::RemoteFetchError {
                url,
                reason,
            } => Self::RemoteFetchError {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::SourceNotFound {
                name,
            } => Self::SourceNotFound {
                name: name.clone(),
            },
            Self::MissingTargetLink {
                name,
                requirement,
                attempted,
            } => Self::MissingTargetLink {
                name: name.clone(),
                requirement: requirement.clone(),
                attempted: *attempted,
            },
            Self::CyclicDependency {
                chain,
            } => Self::CyclicDependency {
                chain: chain.clone(),
            },
            Self::CyclicTargetChain {
                chain,
            } => Self::CyclicTargetChain {
                chain: chain.clone(),
            },
            Self::ConflictingRequirement {
                name,
                first_requirer,
                first_requirement,
                second_requirer,
                second_requirement,
            } => Self::ConflictingRequirement {
                name: name.clone(),
                first_requirer: first_requirer.clone(),
                first_requirement: first_requirement.clone(),
                second_requirer: second_requirer.clone(),
                second_requirement: second_requirement.clone(),
            },
            Self::ManifestNotFound {
                path,
            } => Self::ManifestNotFound {
                path: path.clone(),
            },
            Self::InvalidManifest {
                path,
                reason,
            } => Self::InvalidManifest {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::GitCloneFailed {
                url,
                reason,
            } => Self::GitCloneFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // io::Error is not Clone, keep its message
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps an [`EmbpmError`] and adds an optional suggestion and
/// additional details. This is how the CLI presents errors to users.
///
/// When displayed, errors show:
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context in yellow (optional)
/// 3. **Suggestion**: Actionable steps in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying EMBPM error
    pub error: EmbpmError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: EmbpmError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Known [`EmbpmError`] variants get tailored suggestions; anything else is
/// reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(embpm_error) = error.downcast_ref::<EmbpmError>() {
        return create_error_context(embpm_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(EmbpmError::Other {
                message: error.to_string(),
            })
            .with_suggestion("Check ownership of the project and ~/.embpm directories");
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(EmbpmError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of .embpm/config.toml and ~/.embpm/config.toml");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(EmbpmError::Other {
        message,
    })
}

/// Suggestion attached to a collected error when the CLI reports it.
#[must_use]
pub fn create_error_context(error: EmbpmError) -> ErrorContext {
    match &error {
        EmbpmError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ or your package manager")
            .with_details("EMBPM uses the system git to clone components and targets"),

        EmbpmError::SourceNotFound {
            name,
        } => {
            let suggestion = format!(
                "Add '{name} = \"<repository-url>\"' to the [sources] table of your config, \
                 or depend on a repository location such as owner/{name}"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        EmbpmError::NoMatchingVersion {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Relax the version requirement or publish a matching version tag")
            .with_details("Versions are read from the repository's git tags"),

        EmbpmError::MissingTargetLink {
            attempted: false,
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'embpm target <name>' to install the target hierarchy"),

        EmbpmError::MissingTargetLink {
            attempted: true,
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Use 'embpm link-target' to test a locally modified target prior to publishing",
        ),

        EmbpmError::ConflictingRequirement {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Align the version requirements of both dependents"),

        EmbpmError::CyclicDependency {
            ..
        }
        | EmbpmError::CyclicTargetChain {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Remove one of the references that closes the cycle"),

        EmbpmError::GitCloneFailed {
            url,
            ..
        }
        | EmbpmError::RemoteFetchError {
            url,
            ..
        } => {
            let suggestion = format!(
                "Verify the repository URL is correct: {url}. Check your network connection and repository access"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_both_requirers() {
        let error = EmbpmError::ConflictingRequirement {
            name: "dep".to_string(),
            first_requirer: "app".to_string(),
            first_requirement: "^1.0.0".to_string(),
            second_requirer: "lib".to_string(),
            second_requirement: "^2.0.0".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("'app' requires ^1.0.0"));
        assert!(message.contains("'lib' requires ^2.0.0"));
        assert_eq!(error.subject(), Some("dep"));
    }

    #[test]
    fn test_missing_link_marks_unattempted() {
        let error = EmbpmError::MissingTargetLink {
            name: "base".to_string(),
            requirement: "*".to_string(),
            attempted: false,
        };
        assert_eq!(error.to_string(), "Target 'base' (*) is missing (not installed)");
    }

    #[test]
    fn test_no_matching_version_lists_available() {
        let error = EmbpmError::NoMatchingVersion {
            name: "dep".to_string(),
            requirement: "^3.0.0".to_string(),
            available: vec![],
        };
        assert!(error.to_string().ends_with("(available: none)"));
    }

    #[test]
    fn test_remote_unwraps_clone_failure() {
        let inner = anyhow::Error::new(EmbpmError::GitCloneFailed {
            url: "file:///nowhere".to_string(),
            reason: "fatal: repository not found\n".to_string(),
        });
        let error = EmbpmError::remote("file:///nowhere", &inner);
        match error {
            EmbpmError::RemoteFetchError {
                url,
                reason,
            } => {
                assert_eq!(url, "file:///nowhere");
                assert_eq!(reason, "fatal: repository not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_user_friendly_error_keeps_typed_error() {
        let ctx = user_friendly_error(anyhow::Error::new(EmbpmError::SourceNotFound {
            name: "dep".to_string(),
        }));
        assert!(matches!(ctx.error, EmbpmError::SourceNotFound { .. }));
        assert!(ctx.suggestion.unwrap().contains("[sources]"));
    }

    #[test]
    fn test_io_error_clone_degrades_to_other() {
        let error = EmbpmError::IoError(std::io::Error::other("disk full"));
        assert!(matches!(error.clone(), EmbpmError::Other { .. }));
    }
}
