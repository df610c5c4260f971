//! Newtypes for type-safe identifiers
//!
//! Remote identifiers are opaque strings assigned by the save store.
//! The credential is kept out of `Debug` output so it never ends up in logs.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// SaveId
// ============================================================================

/// Identifier of a save archive stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SaveId(String);

impl SaveId {
    /// Create a new SaveId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains a path separator
    pub fn new(id: String) -> Result<Self, DomainError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidSaveId(
                "Save ID cannot be empty".to_string(),
            ));
        }
        // The ID is interpolated into URL paths
        if trimmed.contains('/') || trimmed.contains('?') || trimmed.contains('#') {
            return Err(DomainError::InvalidSaveId(format!(
                "Save ID contains reserved characters: {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SaveId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SaveId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for SaveId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SaveId> for String {
    fn from(id: SaveId) -> Self {
        id.0
    }
}

// ============================================================================
// FlowId
// ============================================================================

/// Identifier of a device-link flow issued by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlowId(String);

impl FlowId {
    /// Create a new FlowId
    ///
    /// # Errors
    /// Returns error if the ID is empty
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.trim().is_empty() {
            return Err(DomainError::InvalidFlowId(
                "Flow ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FlowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FlowId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<FlowId> for String {
    fn from(id: FlowId) -> Self {
        id.0
    }
}

// ============================================================================
// Credential
// ============================================================================

/// Opaque bearer secret authorizing save-store calls
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Create a new Credential, trimming surrounding whitespace
    ///
    /// # Errors
    /// Returns error if the credential is blank
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidCredential(
                "Credential cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Expose the secret, e.g. to put it in a request header
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
