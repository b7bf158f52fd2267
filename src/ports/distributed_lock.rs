//! Distributed lock port.
//!
//! Serializes multi-statement sequences that must not interleave across
//! concurrently delivered webhooks: subscription creation for one
//! (subscriber, creator, interval) tuple, processing of a single invoice,
//! payout reconciliation for one transfer reference.
//!
//! Keys are built from business identifiers, never from the event id;
//! event-id dedup belongs to the idempotency ledger at a different layer.
//! Failing to acquire is NOT an error: the original flow will complete the
//! work, so the loser skips.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::foundation::{CreatorId, DomainError, SubscriberId};
use crate::domain::subscription::Interval;

/// TTL for subscription and payout locks: generous enough to cover a
/// provider API call made under the lock.
pub const LOCK_TTL: Duration = Duration::from_secs(30);

/// Proof of lock ownership; required for release so one holder can never
/// free another's lock after TTL expiry.
#[derive(Debug, Clone)]
pub struct LockToken {
    pub key: String,
    pub token: String,
}

/// Result of running work under [`with_lock`].
#[derive(Debug)]
pub enum LockOutcome<T> {
    /// Lock acquired; the work ran and produced `T`.
    Completed(T),
    /// Another process owns this work unit; nothing ran.
    Busy,
}

/// Port for an exclusive TTL lock in a shared store.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Attempts to acquire the lock. `None` means another holder owns it,
    /// not an error.
    async fn try_acquire(&self, key: &str, ttl: Duration)
        -> Result<Option<LockToken>, DomainError>;

    /// Releases the lock if the token still owns it. Unconditional
    /// cleanup: releasing an expired or stolen lock is a no-op.
    async fn release(&self, token: LockToken) -> Result<(), DomainError>;
}

/// Runs `work` under the lock, releasing it afterwards even when the work
/// errs. `Busy` means skip, not failure.
pub async fn with_lock<L, F, Fut, T>(
    lock: &L,
    key: &str,
    ttl: Duration,
    work: F,
) -> Result<LockOutcome<T>, DomainError>
where
    L: DistributedLock + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let Some(token) = lock.try_acquire(key, ttl).await? else {
        info!(lock_key = %key, "lock busy, work already in flight");
        return Ok(LockOutcome::Busy);
    };

    let result = work().await;

    if let Err(err) = lock.release(token).await {
        // The TTL will clean up; losing a release is not worth failing the
        // completed work over.
        warn!(lock_key = %key, error = %err, "failed to release lock");
    }

    Ok(LockOutcome::Completed(result))
}

/// Lock key for subscription creation/update of one logical relationship.
pub fn subscription_lock_key(
    subscriber_id: &SubscriberId,
    creator_id: &CreatorId,
    interval: Interval,
) -> String {
    format!("lock:sub:{}:{}:{}", subscriber_id, creator_id, interval.as_str())
}

/// Lock key for processing one invoice.
pub fn invoice_lock_key(invoice_id: &str) -> String {
    format!("lock:invoice:{}", invoice_id)
}

/// Lock key for reconciling one payout/transfer reference.
pub fn payout_lock_key(transfer_reference: &str) -> String {
    format!("lock:payout:{}", transfer_reference)
}
