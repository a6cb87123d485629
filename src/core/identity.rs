//! core::identity
//!
//! Author/committer identity, threaded explicitly through every
//! commit-creating API.
//!
//! Weld never reads identity from ambient process environment at commit
//! time. Callers resolve an [`Identity`] once (normally from git config via
//! [`crate::git::Git::default_identity`]) and pass it down. Tests override
//! it for deterministic authorship.

use serde::{Deserialize, Serialize};

/// A commit author/committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Human-readable name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Identity {
    /// Create an identity from name and email.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_git_convention() {
        let id = Identity::new("Ada Lovelace", "ada@example.com");
        assert_eq!(id.to_string(), "Ada Lovelace <ada@example.com>");
    }
}
