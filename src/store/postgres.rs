//! PostgreSQL store backend.
//!
//! Strings live in `kv_strings`, sets in `kv_sets` (header carrying the
//! expiry) plus `kv_set_members`. Expired rows are filtered out of every
//! read and physically removed by [`TriggerStore::purge_expired`].
//!
//! Each primitive and each script runs in its own transaction. Scripts
//! additionally take `pg_advisory_xact_lock` on every slot in
//! [`Script::slots`] before their first step, so scripts of one tenant run
//! one at a time.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};

use super::script::{Keyspace, Script, ScriptReply};
use super::{StoreError, TriggerStore};
use crate::config::RendezvousConfig;

const LIVE: &str = "(expires_at IS NULL OR expires_at > now())";

/// [`Keyspace`] over one open connection, normally inside a transaction.
#[derive(Debug)]
pub struct PgKeyspace<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgKeyspace<'c> {
    /// Wraps a connection.
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    async fn string_is_live(&mut self, key: &str) -> Result<bool, StoreError> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM kv_strings WHERE key = $1 AND {LIVE})");
        Ok(sqlx::query_scalar::<_, bool>(&sql)
            .bind(key)
            .fetch_one(&mut *self.conn)
            .await?)
    }

    async fn set_is_live(&mut self, key: &str) -> Result<bool, StoreError> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM kv_sets WHERE key = $1 AND {LIVE})");
        Ok(sqlx::query_scalar::<_, bool>(&sql)
            .bind(key)
            .fetch_one(&mut *self.conn)
            .await?)
    }

    async fn lock(&mut self, slot: &str) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(slot)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<'c> Keyspace for PgKeyspace<'c> {
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        if self.set_is_live(key).await? {
            return Err(StoreError::WrongType {
                key: key.to_string(),
            });
        }
        let sql = format!("SELECT value FROM kv_strings WHERE key = $1 AND {LIVE}");
        Ok(sqlx::query_scalar::<_, String>(&sql)
            .bind(key)
            .fetch_optional(&mut *self.conn)
            .await?)
    }

    async fn set_ex(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_sets WHERE key = $1")
            .bind(key)
            .execute(&mut *self.conn)
            .await?;
        sqlx::query(
            "INSERT INTO kv_strings (key, value, expires_at) \
             VALUES ($1, $2, now() + make_interval(secs => $3)) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        let sql = format!(
            "WITH s AS (DELETE FROM kv_strings WHERE key = $1 RETURNING expires_at), \
                  t AS (DELETE FROM kv_sets WHERE key = $1 RETURNING expires_at) \
             SELECT EXISTS (SELECT 1 FROM s WHERE {LIVE}) \
                 OR EXISTS (SELECT 1 FROM t WHERE {LIVE})"
        );
        Ok(sqlx::query_scalar::<_, bool>(&sql)
            .bind(key)
            .fetch_one(&mut *self.conn)
            .await?)
    }

    async fn sadd(&mut self, key: &str, member: &str) -> Result<bool, StoreError> {
        if self.string_is_live(key).await? {
            return Err(StoreError::WrongType {
                key: key.to_string(),
            });
        }
        sqlx::query("DELETE FROM kv_strings WHERE key = $1")
            .bind(key)
            .execute(&mut *self.conn)
            .await?;
        sqlx::query("DELETE FROM kv_sets WHERE key = $1 AND expires_at <= now()")
            .bind(key)
            .execute(&mut *self.conn)
            .await?;
        sqlx::query("INSERT INTO kv_sets (key, expires_at) VALUES ($1, NULL) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .execute(&mut *self.conn)
            .await?;
        let inserted = sqlx::query(
            "INSERT INTO kv_set_members (key, member) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(key)
        .bind(member)
        .execute(&mut *self.conn)
        .await?;
        Ok(inserted.rows_affected() == 1)
    }

    async fn smembers(&mut self, key: &str) -> Result<Vec<String>, StoreError> {
        if self.string_is_live(key).await? {
            return Err(StoreError::WrongType {
                key: key.to_string(),
            });
        }
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT m.member FROM kv_set_members m JOIN kv_sets s ON s.key = m.key \
             WHERE m.key = $1 AND (s.expires_at IS NULL OR s.expires_at > now()) \
             ORDER BY m.member",
        )
        .bind(key)
        .fetch_all(&mut *self.conn)
        .await?)
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let secs = ttl.as_secs_f64();
        let strings = sqlx::query(&format!(
            "UPDATE kv_strings SET expires_at = now() + make_interval(secs => $2) \
             WHERE key = $1 AND {LIVE}"
        ))
        .bind(key)
        .bind(secs)
        .execute(&mut *self.conn)
        .await?;
        let sets = sqlx::query(&format!(
            "UPDATE kv_sets SET expires_at = now() + make_interval(secs => $2) \
             WHERE key = $1 AND {LIVE}"
        ))
        .bind(key)
        .bind(secs)
        .execute(&mut *self.conn)
        .await?;
        Ok(strings.rows_affected() + sets.rows_affected() > 0)
    }
}

/// Store backend persisting the keyspace in PostgreSQL.
///
/// Lets several service instances share one rendezvous state.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the database settings in `config` and applies the
    /// bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database is unreachable or a migration
    /// fails.
    pub async fn connect(config: &RendezvousConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl TriggerStore for PostgresStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let value = PgKeyspace::new(&mut tx).get(key).await?;
        tx.commit().await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        PgKeyspace::new(&mut tx).set_ex(key, value, ttl).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let existed = PgKeyspace::new(&mut tx).delete(key).await?;
        tx.commit().await?;
        Ok(existed)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let added = PgKeyspace::new(&mut tx).sadd(key, member).await?;
        tx.commit().await?;
        Ok(added)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let members = PgKeyspace::new(&mut tx).smembers(key).await?;
        tx.commit().await?;
        Ok(members)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let exists = PgKeyspace::new(&mut tx).expire(key, ttl).await?;
        tx.commit().await?;
        Ok(exists)
    }

    async fn eval(&self, script: &Script) -> Result<ScriptReply, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut keyspace = PgKeyspace::new(&mut tx);
        for slot in script.slots() {
            keyspace.lock(slot).await?;
        }
        let reply = script.run(&mut keyspace).await?;
        tx.commit().await?;
        Ok(reply)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let strings = sqlx::query("DELETE FROM kv_strings WHERE expires_at <= now()")
            .execute(&mut *tx)
            .await?;
        let sets = sqlx::query("DELETE FROM kv_sets WHERE expires_at <= now()")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(strings.rows_affected() + sets.rows_affected())
    }
}
