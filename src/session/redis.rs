use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use super::{SessionState, SessionStore};
use crate::error::Error;
use crate::types::SessionId;

/// Shared session store backed by Redis.
///
/// All keys are namespaced with the configured prefix so one Redis instance
/// can serve several tenants. Values are the JSON-serialized session state;
/// TTLs use Redis key expiry, refreshed on touch for sliding expiration.
/// Concurrent writes to the same session are last-write-wins.
pub struct RedisStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisStore {
    /// Connect to Redis and prepare a namespaced store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the URL is invalid or the connection
    /// cannot be established.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, Error> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Store(format!("invalid redis connection string: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Store(format!("redis connection failed: {e}")))?;
        tracing::info!("Redis session store connected");
        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    fn key(&self, id: &SessionId) -> String {
        format!("{}:{}", self.prefix, id.as_str())
    }
}

impl SessionStore for RedisStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionState>, Error> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.key(id))
            .await
            .map_err(|e| Error::Store(format!("redis GET failed: {e}")))?;
        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| Error::Store(format!("corrupt session payload: {e}"))),
            None => Ok(None),
        }
    }

    async fn save(&self, id: &SessionId, state: &SessionState, ttl: Duration) -> Result<(), Error> {
        let json = serde_json::to_string(state)
            .map_err(|e| Error::Store(format!("session serialization failed: {e}")))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(id), json, ttl.as_secs().max(1))
            .await
            .map_err(|e| Error::Store(format!("redis SETEX failed: {e}")))?;
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.key(id))
            .await
            .map_err(|e| Error::Store(format!("redis DEL failed: {e}")))?;
        Ok(())
    }

    async fn touch(&self, id: &SessionId, ttl: Duration) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .expire(self.key(id), i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
            .await
            .map_err(|e| Error::Store(format!("redis EXPIRE failed: {e}")))?;
        Ok(())
    }
}
