//! Partitioned response cache.
//!
//! This module provides the storage side of the request router:
//!
//! - The [`CacheStorage`] capability trait (open/get/put/delete/keys per
//!   partition, plus cross-partition lookups)
//! - A persistent SQLite backend ([`CacheDb`]) via tokio-rusqlite, with
//!   automatic schema migrations and WAL mode
//! - An in-memory backend ([`MemoryCache`]) for tests and ephemeral runs
//! - Request-keyed storage using SHA-256 hashing

pub mod connection;
pub mod entry;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod partitions;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entry::CachedResponse;
pub use memory::MemoryCache;
pub use storage::CacheStorage;
