//! Distributed lock adapters.

mod redis;

pub use self::redis::RedisDistributedLock;
