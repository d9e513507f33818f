//! Atomic multi-step scripts.
//!
//! A [`Script`] is the unit of atomicity. Its steps are written once, against
//! the [`Keyspace`] primitives, and each backend supplies the atomic context
//! they run in: [`super::MemoryStore`] runs them under its keyspace lock,
//! [`super::PostgresStore`] inside a transaction holding an advisory lock on
//! each of [`Script::slots`].

use std::time::Duration;

use async_trait::async_trait;

use super::StoreError;
use crate::domain::keys;

/// Primitive keyspace operations available to a running script.
///
/// Implementations are only ever handed out inside an atomic context, so
/// consecutive calls observe each other and nothing else.
#[async_trait]
pub trait Keyspace: Send {
    /// Reads a string value.
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a string value with expiry.
    async fn set_ex(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Deletes a key of either type.
    async fn delete(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Adds a set member.
    async fn sadd(&mut self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Lists set members.
    async fn smembers(&mut self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Resets a key's expiry.
    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
}

/// One of the two rendezvous scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Poll-or-register.
    ///
    /// Consumes the inbox value if one is pending, otherwise adds the
    /// address to the waiting pool and refreshes the pool's expiry.
    Select {
        /// Inbox of the polling address.
        inbox_key: String,
        /// Pool the address waits in when nothing is pending.
        waiting_pool_key: String,
        /// Member written into the pool.
        address_id: String,
        /// Pool expiry after registration.
        ttl: Duration,
    },

    /// Drain-and-fan-out.
    ///
    /// Empties the waiting pool and writes `payload` into the inbox of every
    /// member that was in it, overwriting any unread value.
    Dispatch {
        /// Pool to drain.
        waiting_pool_key: String,
        /// Tenant used to build member inbox keys.
        tenant_id: String,
        /// Encoded event.
        payload: String,
        /// Inbox expiry.
        ttl: Duration,
    },
}

impl Script {
    /// Script name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Dispatch { .. } => "dispatch",
        }
    }

    /// Keys the script declares up front, sorted and deduplicated.
    ///
    /// Inbox keys written by `Dispatch` depend on the pool contents and are
    /// not declared.
    #[must_use]
    pub fn lock_keys(&self) -> Vec<&str> {
        let mut keys = match self {
            Self::Select {
                inbox_key,
                waiting_pool_key,
                ..
            } => vec![inbox_key.as_str(), waiting_pool_key.as_str()],
            Self::Dispatch {
                waiting_pool_key, ..
            } => vec![waiting_pool_key.as_str()],
        };
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Hash-tag slots of [`Script::lock_keys`], sorted and deduplicated.
    ///
    /// Every key a script can touch, including the undeclared inboxes of
    /// `Dispatch`, shares the tenant's slot. Serializing scripts per slot is
    /// therefore enough to keep them from interleaving.
    #[must_use]
    pub fn slots(&self) -> Vec<&str> {
        let mut slots: Vec<&str> = self.lock_keys().into_iter().map(keys::hash_tag).collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// Executes the script's steps against `keyspace`.
    ///
    /// The caller is responsible for running this inside an atomic context.
    ///
    /// # Errors
    ///
    /// Propagates the first failing [`Keyspace`] operation.
    pub async fn run<K>(&self, keyspace: &mut K) -> Result<ScriptReply, StoreError>
    where
        K: Keyspace + ?Sized,
    {
        match self {
            Self::Select {
                inbox_key,
                waiting_pool_key,
                address_id,
                ttl,
            } => {
                if let Some(value) = keyspace.get(inbox_key).await? {
                    keyspace.delete(inbox_key).await?;
                    return Ok(ScriptReply::Value(Some(value)));
                }
                keyspace.sadd(waiting_pool_key, address_id).await?;
                keyspace.expire(waiting_pool_key, *ttl).await?;
                Ok(ScriptReply::Value(None))
            }
            Self::Dispatch {
                waiting_pool_key,
                tenant_id,
                payload,
                ttl,
            } => {
                let members = keyspace.smembers(waiting_pool_key).await?;
                if members.is_empty() {
                    return Ok(ScriptReply::Count(0));
                }
                keyspace.delete(waiting_pool_key).await?;
                for member in &members {
                    keyspace
                        .set_ex(&keys::inbox(tenant_id, member), payload, *ttl)
                        .await?;
                }
                Ok(ScriptReply::Count(members.len()))
            }
        }
    }
}

/// Result of [`Script::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply {
    /// Reply of `Select`: the consumed inbox value, if any.
    Value(Option<String>),
    /// Reply of `Dispatch`: number of inboxes written.
    Count(usize),
}

impl ScriptReply {
    /// Unwraps a `Select` reply.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnexpectedReply`] for a `Count` reply.
    pub fn into_value(self) -> Result<Option<String>, StoreError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Count(n) => Err(StoreError::UnexpectedReply(format!(
                "expected value, got count {n}"
            ))),
        }
    }

    /// Unwraps a `Dispatch` reply.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnexpectedReply`] for a `Value` reply.
    pub fn into_count(self) -> Result<usize, StoreError> {
        match self {
            Self::Count(n) => Ok(n),
            Self::Value(_) => Err(StoreError::UnexpectedReply(
                "expected count, got value".to_string(),
            )),
        }
    }
}
