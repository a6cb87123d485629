//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Oid`] - Git object identifier (SHA)
//! - [`SubmodulePath`] - Validated repository-relative submodule path
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use git_weld::core::types::{Oid, SubmodulePath};
//!
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! assert_eq!(oid.short(7), "abc123d");
//!
//! let path = SubmodulePath::new("libs/parser").unwrap();
//! assert_eq!(path.as_str(), "libs/parser");
//!
//! assert!(Oid::new("not-a-sha").is_err());
//! assert!(SubmodulePath::new("/absolute").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid submodule path: {0}")]
    InvalidPath(String),
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated OID from a hex string.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` unless the string is 40 or 64
    /// hex characters.
    pub fn new(hex: impl Into<String>) -> Result<Self, TypeError> {
        let hex = hex.into().to_lowercase();

        if hex.len() != 40 && hex.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex chars, got {}",
                hex.len()
            )));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid("non-hex character".into()));
        }

        Ok(Self(hex))
    }

    /// Get the OID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated repository-relative submodule path.
///
/// Paths are the identity of a submodule inside the meta-repo tree.
/// They must be relative, use forward slashes, and contain no `.`/`..`
/// components. Normalized by stripping a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubmodulePath(String);

impl SubmodulePath {
    /// Create a new validated submodule path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if the path is empty, absolute,
    /// contains backslashes, or has `.`/`..` components.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let mut path = path.into();
        if path.ends_with('/') {
            path.pop();
        }

        if path.is_empty() {
            return Err(TypeError::InvalidPath("path cannot be empty".into()));
        }
        if path.starts_with('/') {
            return Err(TypeError::InvalidPath("path must be relative".into()));
        }
        if path.contains('\\') {
            return Err(TypeError::InvalidPath(
                "path must use forward slashes".into(),
            ));
        }
        for component in path.split('/') {
            if component.is_empty() {
                return Err(TypeError::InvalidPath("empty path component".into()));
            }
            if component == "." || component == ".." {
                return Err(TypeError::InvalidPath(format!(
                    "path cannot contain '{component}' component"
                )));
            }
        }

        Ok(Self(path))
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the path as a `std::path::Path`.
    pub fn as_path(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl TryFrom<String> for SubmodulePath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SubmodulePath> for String {
    fn from(path: SubmodulePath) -> Self {
        path.0
    }
}

impl AsRef<str> for SubmodulePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubmodulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
