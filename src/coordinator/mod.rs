//! Mutation coordination
//!
//! The coordinator core is responsible for:
//! - Routing: executing locally or forwarding to the cluster coordinator
//! - Serializing mutations per resource id
//! - The authorize → verify → revision-check → execute pipeline
//! - Mapping outcomes to HTTP responses

pub mod cluster;
pub mod handler;
pub mod http;
pub mod lock;
pub mod router;
pub mod server;
pub mod write;

pub use cluster::{ClusterMembership, ClusterNode, NodeRole};
pub use handler::{Identified, RequestHandler, ResourceFacade, UpdateRequest};
pub use router::{Forwarder, ForwardedResponse, Reply, ReplicationRouter, RequestDescriptor};
pub use server::Node;
pub use write::{RevisionSource, WriteCoordinator};
