//! Opaque identifiers used throughout authvault.

use crate::error::AuthVaultError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An externally assigned, stable, non-empty session identifier.
///
/// Treated as opaque: authvault never parses or interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Construct a `SessionId`, rejecting empty strings.
    pub fn new(raw: impl Into<String>) -> Result<Self, AuthVaultError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(AuthVaultError::invalid("session id must not be empty"));
        }
        Ok(Self(raw))
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = AuthVaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SessionId {
    type Error = AuthVaultError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
