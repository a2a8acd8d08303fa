//! Cache storage capability.
//!
//! The router never talks to a concrete backend; it holds an
//! `Arc<dyn CacheStorage>` so tests can substitute [`MemoryCache`](super::MemoryCache)
//! for the SQLite-backed [`CacheDb`](super::CacheDb).

use async_trait::async_trait;

use super::entry::CachedResponse;
use crate::Error;

/// Partitioned key/response store.
///
/// Every single operation is atomic on its own. There is no transaction
/// spanning several calls; `put_all` is the only multi-entry write and it is
/// all-or-nothing.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it does not exist yet.
    async fn open(&self, partition: &str) -> Result<(), Error>;

    /// Look up a request in one partition.
    async fn get(&self, partition: &str, method: &str, url: &str) -> Result<Option<CachedResponse>, Error>;

    /// Store an entry, replacing any entry for the same request.
    ///
    /// Opens the partition implicitly. Only `GET` entries can be stored.
    async fn put(&self, partition: &str, entry: &CachedResponse) -> Result<(), Error>;

    /// Store several entries atomically: either all are written or none.
    async fn put_all(&self, partition: &str, entries: &[CachedResponse]) -> Result<(), Error>;

    /// Remove one entry. Returns whether it existed.
    async fn delete(&self, partition: &str, method: &str, url: &str) -> Result<bool, Error>;

    /// URLs stored in a partition, in insertion order.
    async fn keys(&self, partition: &str) -> Result<Vec<String>, Error>;

    /// Look up a request across all partitions, oldest partition first.
    async fn match_any(&self, method: &str, url: &str) -> Result<Option<CachedResponse>, Error>;

    /// First stored HTML document across all partitions, oldest partition first.
    async fn match_html(&self) -> Result<Option<CachedResponse>, Error>;

    /// Names of all partitions in creation order.
    async fn partitions(&self) -> Result<Vec<String>, Error>;

    /// Drop a partition with all its entries. Returns whether it existed.
    async fn delete_partition(&self, partition: &str) -> Result<bool, Error>;
}

/// Reject entries the storage cannot hold.
pub(crate) fn ensure_storable(entry: &CachedResponse) -> Result<(), Error> {
    if !entry.method.eq_ignore_ascii_case("GET") {
        return Err(Error::Storage(format!("request method '{}' is unsupported", entry.method)));
    }
    Ok(())
}
