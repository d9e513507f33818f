//! In-process store backend.
//!
//! [`MemoryStore`] keeps the whole keyspace in a `HashMap` behind a single
//! [`tokio::sync::Mutex`]. Every primitive and every script takes the lock
//! for its full duration, which makes scripts trivially atomic with respect
//! to each other and to the primitives.
//!
//! Expiry uses [`tokio::time::Instant`], so paused-clock tests can advance
//! past a TTL without sleeping.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::script::{Keyspace, Script, ScriptReply};
use super::{StoreError, TriggerStore};

#[derive(Debug)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// The keyspace guarded by [`MemoryStore`]'s lock.
#[derive(Debug, Default)]
pub struct MemoryKeyspace {
    entries: HashMap<String, Entry>,
}

impl MemoryKeyspace {
    /// Returns the live entry at `key`, evicting it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn purge(&mut self) -> u64 {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        (before - self.entries.len()) as u64
    }
}

fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

#[async_trait]
impl Keyspace for MemoryKeyspace {
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn set_ex(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: deadline(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live(key).is_some() && self.entries.remove(key).is_some())
    }

    async fn sadd(&mut self, key: &str, member: &str) -> Result<bool, StoreError> {
        if let Some(entry) = self.live(key) {
            return match &mut entry.value {
                Value::Set(members) => Ok(members.insert(member.to_string())),
                Value::Str(_) => Err(StoreError::WrongType {
                    key: key.to_string(),
                }),
            };
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Set(BTreeSet::from([member.to_string()])),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn smembers(&mut self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.live(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        match self.live(key) {
            Some(entry) => {
                entry.expires_at = deadline(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Store backend living entirely in process memory.
///
/// Suitable for single-instance deployments and tests. State is lost on
/// restart, which is acceptable for debug events bounded by a short TTL.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: Mutex<MemoryKeyspace>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TriggerStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.keyspace.lock().await.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.keyspace.lock().await.set_ex(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.keyspace.lock().await.delete(key).await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.keyspace.lock().await.sadd(key, member).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.keyspace.lock().await.smembers(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.keyspace.lock().await.expire(key, ttl).await
    }

    async fn eval(&self, script: &Script) -> Result<ScriptReply, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        script.run(&mut *keyspace).await
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Ok(self.keyspace.lock().await.purge())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);
    const INBOX: &str = "inbox:{t1}:addr";
    const POOL: &str = "waitingpool:{t1}:s1:trg";

    async fn put(store: &MemoryStore, key: &str, value: &str, ttl: Duration) {
        let Ok(()) = store.set_ex(key, value, ttl).await else {
            panic!("set_ex {key} failed");
        };
    }

    async fn add(store: &MemoryStore, key: &str, member: &str) {
        let Ok(_) = store.sadd(key, member).await else {
            panic!("sadd {key} failed");
        };
    }

    fn select() -> Script {
        Script::Select {
            inbox_key: INBOX.to_string(),
            waiting_pool_key: POOL.to_string(),
            address_id: "addr".to_string(),
            ttl: TTL,
        }
    }

    fn dispatch(payload: &str) -> Script {
        Script::Dispatch {
            waiting_pool_key: POOL.to_string(),
            tenant_id: "t1".to_string(),
            payload: payload.to_string(),
            ttl: TTL,
        }
    }

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStore::new();
        assert!(matches!(store.get("k").await, Ok(None)));

        put(&store, "k", "v", TTL).await;
        let Ok(Some(value)) = store.get("k").await else {
            panic!("expected value");
        };
        assert_eq!(value, "v");

        assert!(matches!(store.delete("k").await, Ok(true)));
        assert!(matches!(store.delete("k").await, Ok(false)));
        assert!(matches!(store.get("k").await, Ok(None)));
    }

    #[tokio::test]
    async fn set_members_are_sorted_and_unique() {
        let store = MemoryStore::new();
        assert!(matches!(store.sadd("s", "b").await, Ok(true)));
        assert!(matches!(store.sadd("s", "a").await, Ok(true)));
        assert!(matches!(store.sadd("s", "b").await, Ok(false)));

        let Ok(members) = store.smembers("s").await else {
            panic!("smembers failed");
        };
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn type_mismatch_is_rejected() {
        let store = MemoryStore::new();
        put(&store, "k", "v", TTL).await;
        add(&store, "s", "m").await;

        assert!(matches!(
            store.sadd("k", "m").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.smembers("k").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.get("s").await,
            Err(StoreError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn expire_on_missing_key_reports_false() {
        let store = MemoryStore::new();
        assert!(matches!(store.expire("missing", TTL).await, Ok(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn string_values_expire() {
        let store = MemoryStore::new();
        put(&store, "k", "v", Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(matches!(store.get("k").await, Ok(Some(_))));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(store.get("k").await, Ok(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn expire_refreshes_set_ttl() {
        let store = MemoryStore::new();
        add(&store, "s", "m").await;
        assert!(matches!(store.expire("s", Duration::from_secs(10)).await, Ok(true)));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(matches!(store.expire("s", Duration::from_secs(10)).await, Ok(true)));

        tokio::time::advance(Duration::from_secs(8)).await;
        let Ok(members) = store.smembers("s").await else {
            panic!("smembers failed");
        };
        assert_eq!(members.len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let Ok(members) = store.smembers("s").await else {
            panic!("smembers failed");
        };
        assert!(members.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let store = MemoryStore::new();
        put(&store, "short", "v", Duration::from_secs(1)).await;
        put(&store, "long", "v", Duration::from_secs(100)).await;
        add(&store, "forever", "m").await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(store.purge_expired().await, Ok(1)));
        assert!(matches!(store.get("long").await, Ok(Some(_))));
        assert!(matches!(store.purge_expired().await, Ok(0)));
    }

    #[tokio::test]
    async fn select_registers_when_inbox_empty() {
        let store = MemoryStore::new();
        let Ok(reply) = store.eval(&select()).await else {
            panic!("eval failed");
        };
        assert_eq!(reply, ScriptReply::Value(None));

        let Ok(members) = store.smembers(POOL).await else {
            panic!("smembers failed");
        };
        assert_eq!(members, vec!["addr".to_string()]);
    }

    #[tokio::test]
    async fn select_consumes_pending_value_without_registering() {
        let store = MemoryStore::new();
        put(&store, INBOX, "event", TTL).await;

        let Ok(reply) = store.eval(&select()).await else {
            panic!("eval failed");
        };
        assert_eq!(reply, ScriptReply::Value(Some("event".to_string())));
        assert!(matches!(store.get(INBOX).await, Ok(None)));
        assert!(matches!(store.smembers(POOL).await, Ok(m) if m.is_empty()));
    }

    #[tokio::test]
    async fn dispatch_on_empty_pool_is_a_no_op() {
        let store = MemoryStore::new();
        let Ok(reply) = store.eval(&dispatch("event")).await else {
            panic!("eval failed");
        };
        assert_eq!(reply, ScriptReply::Count(0));
        assert!(matches!(store.get(INBOX).await, Ok(None)));
    }

    #[tokio::test]
    async fn dispatch_drains_pool_into_every_inbox() {
        let store = MemoryStore::new();
        add(&store, POOL, "addr").await;
        add(&store, POOL, "other").await;

        let Ok(reply) = store.eval(&dispatch("event")).await else {
            panic!("eval failed");
        };
        assert_eq!(reply, ScriptReply::Count(2));
        assert!(matches!(store.smembers(POOL).await, Ok(m) if m.is_empty()));
        assert!(matches!(store.get(INBOX).await, Ok(Some(v)) if v == "event"));
        assert!(matches!(
            store.get("inbox:{t1}:other").await,
            Ok(Some(v)) if v == "event"
        ));
    }

    #[tokio::test]
    async fn failed_script_step_surfaces_error() {
        let store = MemoryStore::new();
        // Pool key holding a string makes the registration step fail.
        put(&store, POOL, "oops", TTL).await;
        assert!(matches!(
            store.eval(&select()).await,
            Err(StoreError::WrongType { .. })
        ));
    }
}
