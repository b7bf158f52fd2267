//! Redis-backed distributed lock for production deployments.
//!
//! SET NX PX with a random token, released through a compare-and-delete
//! Lua script so a holder whose TTL already expired can never delete the
//! next holder's lock.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::MultiplexedConnection;
use redis::Script;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{DistributedLock, LockToken};

/// Deletes the key only when the stored token still matches ours.
static RELEASE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
            return redis.call("DEL", KEYS[1])
        else
            return 0
        end
        "#,
    )
});

#[derive(Clone)]
pub struct RedisDistributedLock {
    conn: MultiplexedConnection,
}

impl RedisDistributedLock {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    fn lock_error(err: redis::RedisError) -> DomainError {
        DomainError::new(ErrorCode::LockError, format!("redis lock: {err}"))
    }
}

#[async_trait]
impl DistributedLock for RedisDistributedLock {
    async fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<LockToken>, DomainError> {
        let token = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();

        // SET key token NX PX ttl; one round trip, atomic.
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(Self::lock_error)?;

        Ok(acquired.map(|_| LockToken {
            key: key.to_string(),
            token,
        }))
    }

    async fn release(&self, token: LockToken) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        let _deleted: i32 = RELEASE_SCRIPT
            .key(&token.key)
            .arg(&token.token)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::lock_error)?;
        Ok(())
    }
}
