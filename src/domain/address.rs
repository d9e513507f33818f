//! Requester identity and the polling address derived from it.
//!
//! An [`AddressId`] names one polling caller: the same
//! `(user, app, node)` triple always yields the same address, so repeated
//! polls from one debugger session land in the same inbox.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RendezvousError;

/// The `(user, app, node)` triple identifying who is polling.
///
/// Construction rejects empty components, so every value of this type is
/// safe to feed into [`AddressId::derive`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequesterIdentity {
    user_id: String,
    app_id: String,
    node_id: String,
}

impl RequesterIdentity {
    /// Builds a requester identity from its three components.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::InvalidRequest`] if any component is empty.
    pub fn new(
        user_id: impl Into<String>,
        app_id: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Result<Self, RendezvousError> {
        let identity = Self {
            user_id: user_id.into(),
            app_id: app_id.into(),
            node_id: node_id.into(),
        };
        for (field, value) in [
            ("user_id", &identity.user_id),
            ("app_id", &identity.app_id),
            ("node_id", &identity.node_id),
        ] {
            if value.is_empty() {
                return Err(RendezvousError::InvalidRequest(format!(
                    "{field} must not be empty"
                )));
            }
        }
        Ok(identity)
    }

    /// Returns the user component.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the app component.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Returns the node component.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

/// Opaque, deterministic address of a polling caller.
///
/// Lowercase hex SHA-256 digest. Each component is hashed behind its
/// big-endian length, so no pair of distinct triples can produce the same
/// hashed byte stream regardless of the characters they contain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressId(String);

impl AddressId {
    /// Derives the address for `identity`.
    #[must_use]
    pub fn derive(identity: &RequesterIdentity) -> Self {
        let mut hasher = Sha256::new();
        for part in [&identity.user_id, &identity.app_id, &identity.node_id] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AddressId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn identity(user: &str, app: &str, node: &str) -> RequesterIdentity {
        let Ok(identity) = RequesterIdentity::new(user, app, node) else {
            panic!("valid identity");
        };
        identity
    }

    #[test]
    fn derive_is_deterministic() {
        let a = AddressId::derive(&identity("u1", "a1", "n1"));
        let b = AddressId::derive(&identity("u1", "a1", "n1"));
        assert_eq!(a, b);
    }

    #[test]
    fn derive_is_hex_sha256() {
        let addr = AddressId::derive(&identity("u1", "a1", "n1"));
        assert_eq!(addr.as_str().len(), 64);
        assert!(addr.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(addr.as_str(), addr.as_str().to_lowercase());
    }

    #[test]
    fn different_triples_differ() {
        let a = AddressId::derive(&identity("u1", "a1", "n1"));
        let b = AddressId::derive(&identity("u1", "a1", "n2"));
        let c = AddressId::derive(&identity("u2", "a1", "n1"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn separator_characters_cannot_shift_boundaries() {
        // Would collide under naive `user|app|node` joining.
        let a = AddressId::derive(&identity("u|a", "b", "n"));
        let b = AddressId::derive(&identity("u", "a|b", "n"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_components_are_rejected() {
        assert!(RequesterIdentity::new("", "a", "n").is_err());
        assert!(RequesterIdentity::new("u", "", "n").is_err());
        assert!(RequesterIdentity::new("u", "a", "").is_err());
    }

    #[test]
    fn accessors_return_components() {
        let id = identity("u1", "a1", "n1");
        assert_eq!(id.user_id(), "u1");
        assert_eq!(id.app_id(), "a1");
        assert_eq!(id.node_id(), "n1");
    }
}
