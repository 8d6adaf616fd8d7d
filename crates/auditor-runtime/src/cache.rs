//! Cache of completed runs.
//!
//! Keyed by the full [`TaskInput`] value, so a hit always belongs to the
//! exact same question and answer.

use moka::future::Cache;
use std::time::Duration;

use auditor_core::{AuditOutcome, TaskInput};

use crate::config::CacheConfig;

pub struct RunCache {
    cache: Cache<TaskInput, AuditOutcome>,
}

impl RunCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, input: &TaskInput) -> Option<AuditOutcome> {
        self.cache.get(input).await
    }

    pub async fn insert(&self, outcome: AuditOutcome) {
        self.cache.insert(outcome.input.clone(), outcome).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for RunCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
