//! Repository locator grammar.
//!
//! A locator names a git repository and optionally a ref or version inside it:
//!
//! ```text
//! locator    = address [ "#" fragment ]
//! address    = ssh-address | scheme-url | shorthand
//! ssh        = user "@" host ":" path          git@github.com:owner/project.git
//! scheme-url = scheme "://" rest               https://host/owner/project.git, file:///srv/repo
//! shorthand  = owner "/" project               owner/project
//! ```
//!
//! Shorthand addresses expand to GitHub HTTPS clone URLs. Locators appear as
//! remote-pin version specs in manifests and as values of the `[sources]` table.

use std::fmt;

use crate::constants::GITHUB_BASE_URL;
use crate::core::EmbpmError;

/// The repository part of a locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RepositoryAddress {
    /// `user@host:path`
    Ssh {
        user: String,
        host: String,
        path: String,
    },
    /// `scheme://...`, kept verbatim
    Url {
        scheme: String,
        url: String,
    },
    /// `owner/project`
    Shorthand {
        owner: String,
        project: String,
    },
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

impl RepositoryAddress {
    /// Parse a bare address (no fragment).
    pub fn parse(text: &str) -> Result<Self, EmbpmError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbpmError::parse("locator", text, "empty repository address"));
        }

        if let Some((scheme, rest)) = text.split_once("://") {
            // an optional `user@` may precede the scheme (`git+ssh://`, `user@https://` forms)
            let scheme_name = scheme.rsplit('@').next().unwrap_or(scheme);
            let valid_scheme = !scheme_name.is_empty()
                && scheme_name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_'));
            if !valid_scheme || rest.is_empty() {
                return Err(EmbpmError::parse("locator", text, "malformed URL"));
            }
            return Ok(Self::Url {
                scheme: scheme_name.to_ascii_lowercase(),
                url: text.to_string(),
            });
        }

        if let Some((user, rest)) = text.split_once('@') {
            if let Some((host, path)) = rest.split_once(':') {
                let valid = !user.is_empty()
                    && user.chars().all(is_word_char)
                    && !host.is_empty()
                    && host.chars().all(is_word_char)
                    && !path.is_empty();
                if valid {
                    return Ok(Self::Ssh {
                        user: user.to_string(),
                        host: host.to_string(),
                        path: path.to_string(),
                    });
                }
            }
            return Err(EmbpmError::parse("locator", text, "expected user@host:path"));
        }

        if let Some((owner, project)) = text.split_once('/') {
            let valid = !owner.is_empty()
                && owner.chars().all(is_word_char)
                && !project.is_empty()
                && project.chars().all(is_word_char);
            if valid {
                return Ok(Self::Shorthand {
                    owner: owner.to_string(),
                    project: project.trim_end_matches(".git").to_string(),
                });
            }
        }

        Err(EmbpmError::parse(
            "locator",
            text,
            "not a repository reference (expected user@host:path, a URL, or owner/project)",
        ))
    }

    /// Whether `text` has the shape of a repository address.
    #[must_use]
    pub fn looks_like(text: &str) -> bool {
        let address = text.split('#').next().unwrap_or_default();
        Self::parse(address).is_ok()
    }

    /// URL handed to `git clone`.
    #[must_use]
    pub fn clone_url(&self) -> String {
        match self {
            Self::Ssh {
                user,
                host,
                path,
            } => format!("{user}@{host}:{path}"),
            Self::Url {
                url,
                ..
            } => url.clone(),
            Self::Shorthand {
                owner,
                project,
            } => format!("{GITHUB_BASE_URL}/{owner}/{project}.git"),
        }
    }

    /// Last path segment without `.git`, used to name clone directories.
    #[must_use]
    pub fn project_name(&self) -> String {
        let tail = match self {
            Self::Ssh {
                path,
                ..
            } => path.as_str(),
            Self::Url {
                url,
                ..
            } => url.as_str(),
            Self::Shorthand {
                project,
                ..
            } => project.as_str(),
        };
        let segment = tail.trim_end_matches('/').rsplit(['/', ':']).next().unwrap_or(tail);
        segment.trim_end_matches(".git").to_string()
    }
}

impl fmt::Display for RepositoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shorthand {
                owner,
                project,
            } => write!(f, "{owner}/{project}"),
            other => write!(f, "{}", other.clone_url()),
        }
    }
}

/// A repository address with an optional `#fragment` (ref or version spec).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    address: RepositoryAddress,
    fragment: Option<String>,
}

impl Locator {
    /// Parse `address[#fragment]`. An empty fragment is treated as absent.
    pub fn parse(text: &str) -> Result<Self, EmbpmError> {
        let (address, fragment) = match text.trim().split_once('#') {
            Some((address, fragment)) => (address, Some(fragment.trim())),
            None => (text.trim(), None),
        };
        let address = RepositoryAddress::parse(address).map_err(|_| {
            EmbpmError::parse("locator", text, "not a recognized repository reference")
        })?;
        Ok(Self {
            address,
            fragment: fragment.filter(|f| !f.is_empty()).map(str::to_string),
        })
    }

    #[must_use]
    pub fn address(&self) -> &RepositoryAddress {
        &self.address
    }

    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    #[must_use]
    pub fn clone_url(&self) -> String {
        self.address.clone_url()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(fragment) => write!(f, "{}#{fragment}", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}
