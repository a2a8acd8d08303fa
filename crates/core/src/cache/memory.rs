//! In-memory implementation of [`CacheStorage`].
//!
//! Used for tests and for runs configured with `db_path = ":memory:"`.
//! Nothing survives the process.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::entry::CachedResponse;
use super::hash::compute_cache_key;
use super::storage::{CacheStorage, ensure_storable};
use crate::Error;

#[derive(Debug, Default)]
struct Partition {
    name: String,
    /// (key_hash, entry) in insertion order.
    entries: Vec<(String, CachedResponse)>,
}

impl Partition {
    fn upsert(&mut self, entry: CachedResponse) {
        let key = entry.key_hash();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((key, entry)),
        }
    }

    fn find(&self, key_hash: &str) -> Option<&CachedResponse> {
        self.entries.iter().find(|(k, _)| k == key_hash).map(|(_, e)| e)
    }
}

/// In-memory partitioned cache.
///
/// Uses a Vec of partitions behind a tokio RwLock, so partition order is
/// creation order.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    partitions: Arc<RwLock<Vec<Partition>>>,
    quota: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total number of stored entries; writes past the limit fail
    /// with a storage error.
    pub fn with_quota(max_entries: usize) -> Self {
        Self { partitions: Arc::default(), quota: Some(max_entries) }
    }

    fn check_quota(&self, partitions: &[Partition], partition: &str, incoming: &[CachedResponse]) -> Result<(), Error> {
        let Some(quota) = self.quota else {
            return Ok(());
        };

        let existing = partitions.iter().find(|p| p.name == partition);
        let added = incoming
            .iter()
            .filter(|e| existing.is_none_or(|p| p.find(&e.key_hash()).is_none()))
            .count();
        let total: usize = partitions.iter().map(|p| p.entries.len()).sum();

        if total + added > quota {
            return Err(Error::Storage(format!("quota of {quota} entries exceeded")));
        }
        Ok(())
    }
}

fn partition_mut<'a>(partitions: &'a mut Vec<Partition>, name: &str) -> &'a mut Partition {
    let idx = match partitions.iter().position(|p| p.name == name) {
        Some(idx) => idx,
        None => {
            partitions.push(Partition { name: name.to_string(), entries: Vec::new() });
            partitions.len() - 1
        }
    };
    &mut partitions[idx]
}

#[async_trait]
impl CacheStorage for MemoryCache {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        let mut partitions = self.partitions.write().await;
        partition_mut(&mut partitions, partition);
        Ok(())
    }

    async fn get(&self, partition: &str, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let key = compute_cache_key(method, url);
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition)
            .and_then(|p| p.find(&key))
            .cloned())
    }

    async fn put(&self, partition: &str, entry: &CachedResponse) -> Result<(), Error> {
        ensure_storable(entry)?;
        let mut partitions = self.partitions.write().await;
        self.check_quota(&partitions, partition, std::slice::from_ref(entry))?;
        partition_mut(&mut partitions, partition).upsert(entry.clone());
        Ok(())
    }

    async fn put_all(&self, partition: &str, entries: &[CachedResponse]) -> Result<(), Error> {
        for entry in entries {
            ensure_storable(entry)?;
        }
        let mut partitions = self.partitions.write().await;
        self.check_quota(&partitions, partition, entries)?;
        let target = partition_mut(&mut partitions, partition);
        for entry in entries {
            target.upsert(entry.clone());
        }
        Ok(())
    }

    async fn delete(&self, partition: &str, method: &str, url: &str) -> Result<bool, Error> {
        let key = compute_cache_key(method, url);
        let mut partitions = self.partitions.write().await;
        let Some(target) = partitions.iter_mut().find(|p| p.name == partition) else {
            return Ok(false);
        };
        let before = target.entries.len();
        target.entries.retain(|(k, _)| *k != key);
        Ok(target.entries.len() != before)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition)
            .map(|p| p.entries.iter().map(|(_, e)| e.url.clone()).collect())
            .unwrap_or_default())
    }

    async fn match_any(&self, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let key = compute_cache_key(method, url);
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().find_map(|p| p.find(&key)).cloned())
    }

    async fn match_html(&self) -> Result<Option<CachedResponse>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .flat_map(|p| p.entries.iter().map(|(_, e)| e))
            .find(|e| e.is_html())
            .cloned())
    }

    async fn partitions(&self) -> Result<Vec<String>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|p| p.name.clone()).collect())
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, Error> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|p| p.name != partition);
        Ok(partitions.len() != before)
    }
}
