//! # flowcoord
//!
//! Mutation coordination for a clustered flow-management control plane:
//! - Forwarding of every request to the elected coordinator when this node
//!   is a follower
//! - Per-resource write serialization with optimistic revisions
//! - An authorize → verify → revision-check → execute pipeline that either
//!   fully applies a mutation or rejects it with a stable status code
//!
//! ## Architecture
//!
//! ```text
//!  client ──► Follower ──(verbatim forward)──► Coordinator
//!                                                 │
//!                                      ┌──────────┴───────────┐
//!                                      │ RequestHandler       │
//!                                      │  ├ ReplicationRouter │
//!                                      │  ├ AuthorizationGate │
//!                                      │  └ WriteCoordinator  │
//!                                      │     (lock per id)    │
//!                                      └──────────┬───────────┘
//!                                                 ▼
//!                                          ResourceFacade
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Coordinator
//! flowcoord serve --id node-1 --bind 0.0.0.0:8080 --config ./node-1.toml
//!
//! # Follower forwarding to it
//! flowcoord serve --id node-2 --bind 0.0.0.0:8081 \
//!   --role follower --coordinator http://node-1:8080
//!
//! # Mint a bearer token
//! flowcoord token --secret "$SECRET" --principal alice
//! ```

pub mod common;
pub mod coordinator;
pub mod port;

pub use common::{Config, Error, Result};
pub use coordinator::Node;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
