//! In-memory distributed lock.
//!
//! Single-process stand-in for the redis lock; same token-guarded
//! release semantics so tests exercise the real contention behavior.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::foundation::DomainError;
use crate::ports::{DistributedLock, LockToken};

#[derive(Default)]
pub struct InMemoryDistributedLock {
    held: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryDistributedLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for InMemoryDistributedLock {
    async fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<LockToken>, DomainError> {
        let mut held = self.held.lock().await;
        if let Some((_, expires_at)) = held.get(key) {
            if *expires_at > Instant::now() {
                return Ok(None);
            }
        }
        let token = Uuid::new_v4().to_string();
        held.insert(key.to_string(), (token.clone(), Instant::now() + ttl));
        Ok(Some(LockToken {
            key: key.to_string(),
            token,
        }))
    }

    async fn release(&self, token: LockToken) -> Result<(), DomainError> {
        let mut held = self.held.lock().await;
        if let Some((owner, _)) = held.get(&token.key) {
            if *owner == token.token {
                held.remove(&token.key);
            }
        }
        Ok(())
    }
}
