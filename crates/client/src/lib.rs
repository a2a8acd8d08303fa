//! Client code for mcp-stash.
//!
//! This crate provides the HTTP fetch pipeline and the request cache router
//! (classification, caching strategies, worker lifecycle) used by the server.

pub mod fetch;
pub mod router;

pub use fetch::{FetchClient, FetchConfig, FetchRequest, FetchResponse, Fetcher};
pub use router::{
    ControlMessage, ControlReply, FetchOutcome, LifecycleState, Notification, RequestClass, ResponseSource, Routed,
    Router, RouterConfig, Strategy, Worker,
};
