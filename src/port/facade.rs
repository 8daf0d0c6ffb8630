//! In-memory input port facade
//!
//! Holds every port with its current version behind one `RwLock`, so readers
//! always observe a port and its version together.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::common::auth::{Authorizable, AuthorizableLookup, Authorizer, PolicyAuthorizable};
use crate::common::{Error, Result, Revision, Versioned};
use crate::coordinator::handler::ResourceFacade;
use crate::coordinator::write::RevisionSource;
use crate::port::model::{Port, PortDto, PortState, COLLECTION};

#[derive(Debug, Clone)]
struct Entry {
    port: Port,
    version: u64,
}

pub struct PortFacade {
    ports: RwLock<HashMap<String, Entry>>,
    authorizer: Arc<dyn Authorizer>,
}

impl PortFacade {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            ports: RwLock::new(HashMap::new()),
            authorizer,
        }
    }

    /// Add or replace a port at `version`
    pub fn insert(&self, port: Port, version: u64) {
        let mut ports = self.ports.write().unwrap_or_else(PoisonError::into_inner);
        ports.insert(port.id.clone(), Entry { port, version });
    }

    pub fn len(&self) -> usize {
        self.ports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: &str) -> Result<Entry> {
        self.ports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: &str) -> Error {
    Error::NotFound(format!("unable to find input port with id '{}'", id))
}

fn policy_resource(id: &str) -> String {
    format!("/{}/{}", COLLECTION, id)
}

fn check_version(revision: &Revision, current: u64) -> Result<()> {
    if revision.matches(current) {
        Ok(())
    } else {
        Err(Error::Conflict(format!(
            "{} is not the most up-to-date revision; current version is {}",
            revision, current
        )))
    }
}

impl AuthorizableLookup for PortFacade {
    fn resolve(&self, resource_id: &str) -> Result<Arc<dyn Authorizable>> {
        self.entry(resource_id)?;
        Ok(Arc::new(PolicyAuthorizable::new(
            policy_resource(resource_id),
            self.authorizer.clone(),
        )))
    }
}

impl RevisionSource for PortFacade {
    fn current_version(&self, resource_id: &str) -> Result<u64> {
        self.entry(resource_id).map(|e| e.version)
    }
}

impl ResourceFacade for PortFacade {
    type State = Port;
    type Proposed = PortDto;

    fn get(&self, id: &str) -> Result<Versioned<Port>> {
        let entry = self.entry(id)?;
        Ok(Versioned::new(
            entry.port,
            Revision::new(Some(entry.version), "", id),
        ))
    }

    fn verify_update(&self, proposed: &PortDto) -> Result<()> {
        let id = proposed.id.as_deref().unwrap_or_default();
        let current = self.entry(id)?.port;

        if let Some(name) = &proposed.name {
            if name.trim().is_empty() {
                return Err(Error::PreconditionFailed("port name must not be blank".into()));
            }
        }
        if proposed.concurrent_tasks == Some(0) {
            return Err(Error::PreconditionFailed(
                "concurrent tasks must be at least 1".into(),
            ));
        }
        if current.state == PortState::Running && proposed.changes_configuration(&current) {
            return Err(Error::PreconditionFailed(format!(
                "{} is running; stop it before changing its configuration",
                id
            )));
        }
        if current.state == PortState::Disabled && proposed.state == Some(PortState::Running) {
            return Err(Error::PreconditionFailed(format!(
                "{} is disabled and cannot be started",
                id
            )));
        }
        Ok(())
    }

    fn update(&self, revision: &Revision, proposed: &PortDto) -> Result<Versioned<Port>> {
        let id = revision.resource_id();
        let mut ports = self.ports.write().unwrap_or_else(PoisonError::into_inner);
        let entry = ports.get_mut(id).ok_or_else(|| not_found(id))?;
        check_version(revision, entry.version)?;

        proposed.apply_to(&mut entry.port);
        let next = revision.next(entry.version);
        entry.version += 1;
        tracing::info!(port = %id, version = entry.version, "input port updated");
        Ok(Versioned::new(entry.port.clone(), next))
    }

    fn verify_delete(&self, id: &str) -> Result<()> {
        let current = self.entry(id)?.port;
        if current.state == PortState::Running {
            return Err(Error::PreconditionFailed(format!(
                "{} is running and cannot be deleted",
                id
            )));
        }
        Ok(())
    }

    fn delete(&self, revision: &Revision, id: &str) -> Result<Versioned<Port>> {
        let mut ports = self.ports.write().unwrap_or_else(PoisonError::into_inner);
        let entry = ports.get(id).ok_or_else(|| not_found(id))?;
        check_version(revision, entry.version)?;

        let next = revision.next(entry.version);
        let removed = ports.remove(id).ok_or_else(|| not_found(id))?;
        tracing::info!(port = %id, "input port deleted");
        Ok(Versioned::new(removed.port, next))
    }
}
