//! Per-operation request orchestration, generic over the resource kind
//!
//! Each operation validates its input, asks the [`ReplicationRouter`] whether
//! to forward, and otherwise runs locally: reads go through the
//! [`AuthorizationGate`] straight to the facade, mutations go through the
//! [`WriteCoordinator`].

use std::sync::Arc;

use crate::common::audit::{AuditEvent, AuditLogger};
use crate::common::auth::{AuthorizationGate, AuthorizableLookup, Principal, ResourceAuthorizer};
use crate::common::{Error, Result, Revision, RevisionDto, Versioned};
use crate::coordinator::router::{Reply, ReplicationRouter, RequestDescriptor};
use crate::coordinator::write::{RevisionSource, WriteCoordinator};

/// Domain facade for one kind of resource. Owns the resource state and its
/// current revision; the core never looks inside `State`.
pub trait ResourceFacade: AuthorizableLookup + RevisionSource + 'static {
    type State: Send;
    type Proposed: Identified + Send + Sync;

    fn get(&self, id: &str) -> Result<Versioned<Self::State>>;

    /// Is `proposed` a legal update given the current state?
    fn verify_update(&self, proposed: &Self::Proposed) -> Result<()>;

    fn update(&self, revision: &Revision, proposed: &Self::Proposed) -> Result<Versioned<Self::State>>;

    /// Can `id` be deleted in its current state?
    fn verify_delete(&self, id: &str) -> Result<()>;

    /// Remove `id`, returning its final state.
    fn delete(&self, revision: &Revision, id: &str) -> Result<Versioned<Self::State>>;
}

/// A proposed state that names the resource it targets.
pub trait Identified {
    fn id(&self) -> Option<&str>;
}

/// Update request body: the proposed component plus the client's revision
#[derive(Debug, Clone)]
pub struct UpdateRequest<P> {
    pub revision: Option<RevisionDto>,
    pub component: Option<P>,
}

pub struct RequestHandler<F: ResourceFacade> {
    kind: &'static str,
    facade: Arc<F>,
    writes: Arc<WriteCoordinator>,
    router: Arc<ReplicationRouter>,
    audit: Arc<AuditLogger>,
}

impl<F: ResourceFacade> Clone for RequestHandler<F> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            facade: self.facade.clone(),
            writes: self.writes.clone(),
            router: self.router.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<F: ResourceFacade> RequestHandler<F> {
    /// `kind` names the resource in messages and audit entries, e.g. "input port".
    pub fn new(
        kind: &'static str,
        facade: Arc<F>,
        writes: Arc<WriteCoordinator>,
        router: Arc<ReplicationRouter>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            kind,
            facade,
            writes,
            router,
            audit,
        }
    }

    pub fn facade(&self) -> &Arc<F> {
        &self.facade
    }

    pub async fn get(
        &self,
        principal: &Principal,
        request: &RequestDescriptor,
        id: &str,
    ) -> Result<Reply<Versioned<F::State>>> {
        self.router
            .dispatch(request, || async {
                let gate = AuthorizationGate::new(self.facade.as_ref(), principal);
                self.audit_denial(principal, id, gate.authorize_read(id))?;
                self.facade.get(id)
            })
            .await
    }

    pub async fn update(
        &self,
        principal: &Principal,
        request: &RequestDescriptor,
        id: &str,
        body: Option<UpdateRequest<F::Proposed>>,
    ) -> Result<Reply<Versioned<F::State>>> {
        let body = body.ok_or_else(|| {
            Error::BadRequest(format!("{} details must be specified", self.kind))
        })?;
        let proposed = body.component.ok_or_else(|| {
            Error::BadRequest(format!("{} details must be specified", self.kind))
        })?;
        let revision = body
            .revision
            .ok_or_else(|| Error::BadRequest("revision must be specified".into()))?;
        if proposed.id() != Some(id) {
            return Err(Error::BadRequest(format!(
                "the {} id ({}) in the request body does not equal the {} id of the requested resource ({})",
                self.kind,
                proposed.id().unwrap_or(""),
                self.kind,
                id
            )));
        }
        if revision.version.is_none() {
            return Err(Error::BadRequest("revision version must be specified".into()));
        }

        self.router
            .dispatch(request, || async {
                let revision = Revision::from_dto(&revision, id);
                let facade = self.facade.as_ref();
                let updated = self
                    .writes
                    .run(
                        facade,
                        &revision,
                        |lookup| {
                            let gate = AuthorizationGate::new(lookup, principal);
                            self.audit_denial(principal, id, gate.authorize_write(id))
                        },
                        || facade.verify_update(&proposed),
                        || facade.update(&revision, &proposed),
                    )
                    .await?;
                self.audit.record(
                    principal,
                    AuditEvent::ResourceUpdated {
                        kind: self.kind.to_string(),
                        resource_id: id.to_string(),
                        version: updated.revision.version(),
                    },
                );
                Ok(updated)
            })
            .await
    }

    pub async fn delete(
        &self,
        principal: &Principal,
        request: &RequestDescriptor,
        id: &str,
        version: Option<u64>,
        client_id: Option<String>,
    ) -> Result<Reply<Versioned<F::State>>> {
        self.router
            .dispatch(request, || async {
                let revision = Revision::new(version, client_id.unwrap_or_default(), id);
                let facade = self.facade.as_ref();
                let deleted = self
                    .writes
                    .run(
                        facade,
                        &revision,
                        |lookup| {
                            let gate = AuthorizationGate::new(lookup, principal);
                            self.audit_denial(principal, id, gate.authorize_write(id))
                        },
                        || facade.verify_delete(id),
                        || facade.delete(&revision, id),
                    )
                    .await?;
                self.audit.record(
                    principal,
                    AuditEvent::ResourceDeleted {
                        kind: self.kind.to_string(),
                        resource_id: id.to_string(),
                        unconditional: revision.is_unconditional(),
                    },
                );
                Ok(deleted)
            })
            .await
    }

    fn audit_denial(&self, principal: &Principal, id: &str, result: Result<()>) -> Result<()> {
        if let Err(Error::AuthorizationDenied(reason)) = &result {
            self.audit.record(
                principal,
                AuditEvent::AuthorizationDenied {
                    resource_id: id.to_string(),
                    reason: reason.clone(),
                },
            );
        }
        result
    }
}
