//! Caller identity used for rate limiting and end-user pseudonymization
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use sha2::{Digest, Sha256};
use std::fmt;

/// Name reserved for tool-triggered calls (as opposed to end-user commands)
pub const FUNCTION_IDENTITY: &str = "function";

/// Opaque caller key: chat applications hand over either a numeric user id
/// or a string handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Name(String),
    Id(i64),
}

impl Identity {
    /// Sentinel identity for programmatic `generate_image` calls
    pub fn function() -> Self {
        Identity::Name(FUNCTION_IDENTITY.to_string())
    }

    /// One-way pseudonym sent to providers for abuse tracking.
    ///
    /// Lowercase hex SHA-256 of the identity's string form. This is a
    /// privacy control, not a security boundary.
    pub fn pseudonym(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Default for Identity {
    fn default() -> Self {
        Identity::Id(0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Name(name) => write!(f, "{name}"),
            Identity::Id(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity::Name(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::Name(value)
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Identity::Id(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudonym_is_sha256_of_display_form() {
        // sha256("42")
        assert_eq!(
            Identity::Id(42).pseudonym(),
            "73475cb40a568e8da8a045ced110137e159f890ac4da883b6b17dc651b3a8049"
        );
    }

    #[test]
    fn test_pseudonym_matches_for_equal_string_forms() {
        assert_eq!(
            Identity::Id(42).pseudonym(),
            Identity::from("42").pseudonym()
        );
        assert_ne!(Identity::Id(42).pseudonym(), Identity::Id(43).pseudonym());
    }

    #[test]
    fn test_pseudonym_does_not_leak_identity() {
        let pseudonym = Identity::from("alice").pseudonym();
        assert_eq!(pseudonym.len(), 64);
        assert!(!pseudonym.contains("alice"));
    }

    #[test]
    fn test_function_sentinel() {
        assert_eq!(Identity::function().to_string(), "function");
        assert_ne!(Identity::function(), Identity::from("someone"));
    }
}
