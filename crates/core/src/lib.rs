//! Core types and shared functionality for mcp-stash.
//!
//! This crate provides:
//! - Partitioned response cache with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStorage, CachedResponse, MemoryCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
