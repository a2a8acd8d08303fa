//! Cache inspection tools.
//!
//! Operate on the worker's partitioned storage directly, without routing.

pub mod get;
pub mod keys;
pub mod purge;

pub use get::{CacheGetParams, get_impl};
pub use keys::{CacheKeysParams, keys_impl};
pub use purge::{CachePurgeParams, purge_impl};
