use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of one competition platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FopId(String);

impl FopId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FopId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque identity of whoever issued a command (a console, a display, the engine itself).
///
/// The surrounding session layer decides what goes in here; the engine only compares them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Issuer(String);

impl Issuer {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identity, used for displays that have no session-provided name.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Identity used for state changes the engine makes on its own (heartbeats).
    pub fn engine() -> Self {
        Self("engine".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Issuer {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Reference to an athlete held by the (external) registration layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AthleteRef(String);

impl AthleteRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AthleteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
