//! Store key naming.
//!
//! Every key embeds the tenant inside `{...}` so a clustered store hashes
//! all keys of one tenant to the same slot. Scripts rely on that: the keys
//! a script touches must live on one partition.
//!
//! Identifiers are embedded verbatim, so [`validate_segment`] must accept
//! every tenant, subscription and trigger name before a key is built from it.

use super::AddressId;
use crate::error::RendezvousError;

/// Prefix of single-slot inbox keys.
pub const INBOX_PREFIX: &str = "inbox";

/// Prefix of waiting-pool set keys.
pub const WAITING_POOL_PREFIX: &str = "waitingpool";

/// Inbox key for `address` under `tenant_id`.
#[must_use]
pub fn inbox(tenant_id: &str, address: &str) -> String {
    format!("{INBOX_PREFIX}:{{{tenant_id}}}:{address}")
}

/// Inbox key for a derived [`AddressId`].
#[must_use]
pub fn inbox_for(tenant_id: &str, address: &AddressId) -> String {
    inbox(tenant_id, address.as_str())
}

/// Waiting-pool key for one trigger of one subscription.
#[must_use]
pub fn waiting_pool(tenant_id: &str, subscription_id: &str, trigger_name: &str) -> String {
    format!("{WAITING_POOL_PREFIX}:{{{tenant_id}}}:{subscription_id}:{trigger_name}")
}

/// Rejects identifiers that would corrupt a store key.
///
/// A `{`, `}` or `:` inside a segment could make two distinct identifier
/// tuples build the same key, or move a key into another tenant's slot.
///
/// # Errors
///
/// Returns [`RendezvousError::InvalidRequest`] if `value` is empty or
/// contains `{`, `}` or `:`.
pub fn validate_segment(name: &str, value: &str) -> Result<(), RendezvousError> {
    if value.is_empty() {
        return Err(RendezvousError::InvalidRequest(format!(
            "{name} must not be empty"
        )));
    }
    if value.contains(['{', '}', ':']) {
        return Err(RendezvousError::InvalidRequest(format!(
            "{name} contains a reserved character: {value}"
        )));
    }
    Ok(())
}

/// Hash tag of `key`: the text between the first `{` and the next `}`, or
/// the whole key when it has no non-empty tag.
///
/// Keys sharing a hash tag belong to one slot.
#[must_use]
pub fn hash_tag(key: &str) -> &str {
    key.split_once('{')
        .and_then(|(_, rest)| rest.split_once('}'))
        .map(|(tag, _)| tag)
        .filter(|tag| !tag.is_empty())
        .unwrap_or(key)
}
