//! Key-value store abstraction with TTL expiry and atomic scripts.
//!
//! [`TriggerStore`] is the only shared mutable resource in the service. The
//! primitive operations mirror a Redis-style keyspace (string values and
//! sets, per-key expiry); [`TriggerStore::eval`] runs a [`Script`] as one
//! indivisible unit. The coordination protocol only ever mutates the store
//! through `eval`.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: in-process keyspace behind a mutex.
//! - [`PostgresStore`]: tables in PostgreSQL, scripts run in a transaction
//!   holding advisory locks on the script's keys.

pub mod memory;
pub mod postgres;
pub mod script;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use script::{Keyspace, Script, ScriptReply};

/// Failure reported by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A set operation hit a string key or vice versa.
    #[error("wrong value type at key {key}")]
    WrongType {
        /// Offending key.
        key: String,
    },

    /// A script returned a reply of the wrong shape.
    #[error("unexpected script reply: {0}")]
    UnexpectedReply(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Key-value store consumed by the coordination service.
///
/// Expired entries are never observable through any operation, whether or
/// not they have been physically removed yet.
#[async_trait]
pub trait TriggerStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for health reporting.
    fn backend_name(&self) -> &'static str;

    /// Reads a string value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or if `key` holds a set.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a string value that expires after `ttl`, replacing any value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Deletes a key of either type. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Adds `member` to the set at `key`. Returns whether it was new.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or if `key` holds a string.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Returns all members of the set at `key`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or if `key` holds a string.
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Resets the expiry of `key` to `ttl`. Returns whether the key exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Runs `script` atomically: no other operation observes a partial
    /// execution.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any step fails; no step is then visible.
    async fn eval(&self, script: &Script) -> Result<ScriptReply, StoreError>;

    /// Physically removes expired entries. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}
