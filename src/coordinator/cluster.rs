//! Cluster membership as seen by this node
//!
//! Election is out of scope: the node's role and the coordinator address come
//! from configuration and can be changed at runtime by whatever membership
//! mechanism is deployed alongside (see [`ClusterNode::become_coordinator`]
//! and [`ClusterNode::step_down`]).

use std::sync::{PoisonError, RwLock};

use crate::common::config::{ClusterConfig, ClusterRole};

/// Answers "who executes cluster-wide mutations".
pub trait ClusterMembership: Send + Sync {
    /// False when clustering is disabled; every request is then local.
    fn is_clustered(&self) -> bool;

    /// True when this node is the elected coordinator.
    fn is_coordinator(&self) -> bool;

    /// Base URL of the current coordinator, if known.
    fn coordinator_url(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Standalone,
    Coordinator,
    Follower,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Standalone => write!(f, "standalone"),
            NodeRole::Coordinator => write!(f, "coordinator"),
            NodeRole::Follower => write!(f, "follower"),
        }
    }
}

#[derive(Debug)]
struct Membership {
    role: NodeRole,
    coordinator_url: Option<String>,
}

/// This node's view of the cluster
#[derive(Debug)]
pub struct ClusterNode {
    node_id: String,
    state: RwLock<Membership>,
}

impl ClusterNode {
    pub fn new(node_id: impl Into<String>, config: &ClusterConfig) -> Self {
        let role = match (config.enabled, config.role) {
            (false, _) => NodeRole::Standalone,
            (true, ClusterRole::Coordinator) => NodeRole::Coordinator,
            (true, ClusterRole::Follower) => NodeRole::Follower,
        };
        Self {
            node_id: node_id.into(),
            state: RwLock::new(Membership {
                role,
                coordinator_url: config.coordinator_url.clone(),
            }),
        }
    }

    /// A node with clustering disabled
    pub fn standalone(node_id: impl Into<String>) -> Self {
        Self::new(node_id, &ClusterConfig::default())
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn role(&self) -> NodeRole {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .role
    }

    /// Take over as coordinator
    pub fn become_coordinator(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.role == NodeRole::Standalone {
            return;
        }
        state.role = NodeRole::Coordinator;
        state.coordinator_url = None;
        tracing::info!(node = %self.node_id, "became cluster coordinator");
    }

    /// Step down to follower of `coordinator_url` (unknown when `None`)
    pub fn step_down(&self, coordinator_url: Option<String>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.role == NodeRole::Standalone {
            return;
        }
        state.role = NodeRole::Follower;
        tracing::info!(
            node = %self.node_id,
            coordinator = coordinator_url.as_deref().unwrap_or("unknown"),
            "stepped down to follower"
        );
        state.coordinator_url = coordinator_url;
    }
}

impl ClusterMembership for ClusterNode {
    fn is_clustered(&self) -> bool {
        self.role() != NodeRole::Standalone
    }

    fn is_coordinator(&self) -> bool {
        self.role() == NodeRole::Coordinator
    }

    fn coordinator_url(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match state.role {
            NodeRole::Follower => state.coordinator_url.clone(),
            _ => None,
        }
    }
}
