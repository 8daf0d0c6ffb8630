//! Write coordination
//!
//! Every local mutation runs through [`WriteCoordinator::run`]:
//!
//! ```text
//! RECEIVED → LOCK_ACQUIRED → AUTHORIZED → VERIFIED → REVISION_CHECKED → EXECUTED
//!                                 │           │              │             │
//!                                 └───────────┴──────────────┴── FAILED ───┤
//!                                                                          ▼
//!                                                              LOCK_RELEASED → RESPONDED
//! ```
//!
//! The lock is a [`ResourceLockGuard`](crate::coordinator::lock::ResourceLockGuard) held by the pipeline's stack frame, so
//! it is released exactly once on every path, including early returns.

use std::sync::Arc;
use std::time::Duration;

use crate::common::auth::AuthorizableLookup;
use crate::common::{Error, Result, Revision};
use crate::coordinator::lock::ResourceLocks;

/// Source of the authoritative version of a resource.
pub trait RevisionSource: Send + Sync {
    /// Current stored version of `resource_id`, or [`Error::NotFound`].
    fn current_version(&self, resource_id: &str) -> Result<u64>;
}

/// Serializes mutations per resource id.
pub struct WriteCoordinator {
    locks: Arc<ResourceLocks>,
    lock_timeout: Duration,
}

impl WriteCoordinator {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            locks: Arc::new(ResourceLocks::new()),
            lock_timeout,
        }
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.locks
    }

    /// Run one mutation pipeline for `revision.resource_id()`.
    ///
    /// `authorize` receives the lookup so it can resolve the resource and
    /// check the caller's action. `verify` is the caller's pre-flight check.
    /// `execute` is only invoked once all checks pass.
    pub async fn run<S, T, A, V, X>(
        &self,
        store: &S,
        revision: &Revision,
        authorize: A,
        verify: V,
        execute: X,
    ) -> Result<T>
    where
        S: AuthorizableLookup + RevisionSource,
        A: FnOnce(&dyn AuthorizableLookup) -> Result<()>,
        V: FnOnce() -> Result<()>,
        X: FnOnce() -> Result<T>,
    {
        let resource_id = revision.resource_id();
        let _lock = self.locks.acquire(resource_id, self.lock_timeout).await?;
        tracing::debug!(resource = %resource_id, "write lock acquired");

        let result = Self::pipeline(store, revision, authorize, verify, execute);

        match &result {
            Ok(_) => tracing::debug!(revision = %revision, "mutation applied"),
            Err(e) => tracing::debug!(revision = %revision, error = %e, "mutation rejected"),
        }
        result
    }

    fn pipeline<S, T, A, V, X>(
        store: &S,
        revision: &Revision,
        authorize: A,
        verify: V,
        execute: X,
    ) -> Result<T>
    where
        S: AuthorizableLookup + RevisionSource,
        A: FnOnce(&dyn AuthorizableLookup) -> Result<()>,
        V: FnOnce() -> Result<()>,
        X: FnOnce() -> Result<T>,
    {
        authorize(store)?;

        verify().map_err(|e| match e {
            Error::PreconditionFailed(_) | Error::NotFound(_) => e,
            other => Error::PreconditionFailed(other.to_string()),
        })?;

        if let Some(expected) = revision.version() {
            let current = store.current_version(revision.resource_id())?;
            if expected != current {
                return Err(Error::StaleRevision {
                    resource_id: revision.resource_id().to_string(),
                    expected,
                    current,
                });
            }
        }

        execute()
    }
}
