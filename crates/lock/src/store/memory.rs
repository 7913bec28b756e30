//! In-process lock store
//!
//! Every operation on a key runs under that key's `DashMap` shard lock,
//! which gives the same per-key atomicity a real store provides. Expiry is
//! lazy: a record past its deadline is treated as absent by every read and
//! replaced or removed on the next write. Deadlines use
//! [`tokio::time::Instant`], so tests on a paused clock drive expiry with
//! `tokio::time::advance`.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use super::LockStore;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Record {
    value: String,
    expires_at: Option<Instant>,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// `DashMap`-backed [`LockStore`] for tests, demos, and single-process use
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Record>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `key` unconditionally, with an optional expiry.
    ///
    /// Stands in for another process writing to the shared store.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        let now = Instant::now();
        self.records.insert(
            key.into(),
            Record {
                value: value.into(),
                expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            },
        );
    }

    /// Time left before `key` expires. `None` if absent or without expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let record = self.records.get(key)?;
        if !record.is_live(now) {
            return None;
        }
        record.expires_at.map(|deadline| deadline - now)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.records.iter().filter(|r| r.is_live(now)).count()
    }

    /// Returns `true` if no live record exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired records, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.records.len();
        self.records.retain(|_, record| record.is_live(now));
        before - self.records.len()
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        if ttl.is_zero() {
            return Err(StoreError::rejected("set_if_absent", "expiry must be positive"));
        }

        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            return Err(StoreError::rejected("set_if_absent", "expiry out of range"));
        };
        let record = Record {
            value: value.to_owned(),
            expires_at: Some(expires_at),
        };

        match self.records.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(record);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .records
            .get(key)
            .filter(|record| record.is_live(now))
            .map(|record| record.value.clone()))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .records
            .remove_if(key, |_, record| {
                record.is_live(now) && record.value == expected
            })
            .is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .records
            .remove(key)
            .is_some_and(|(_, record)| record.is_live(now)))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
