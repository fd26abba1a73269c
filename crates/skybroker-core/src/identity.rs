//! Authenticated caller identity

use serde::{Deserialize, Serialize};

/// An already-authenticated identity plus its federation token.
///
/// Authentication and authorization happen upstream; the broker only
/// carries the identity through every call so plugins can act on the
/// user's behalf and remote providers can re-check ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemUser {
    /// Stable user id, unique within the federation.
    pub id: String,

    /// Human-readable name, if the identity provider supplied one.
    pub name: Option<String>,

    /// Opaque federation token forwarded on remote delegation.
    pub token: String,
}

impl SystemUser {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            token: token.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
