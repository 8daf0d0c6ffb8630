//! Revisions: optimistic-concurrency claims made by clients
//!
//! A [`Revision`] pairs the version a client last observed with the client's
//! identity and the id of the resource the claim is about. A revision with no
//! version carries no expectation and is only accepted for deletes.

use serde::{Deserialize, Serialize};

/// Expected version of one resource, as claimed by one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    version: Option<u64>,
    client_id: String,
    resource_id: String,
}

impl Revision {
    pub fn new(version: Option<u64>, client_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            version,
            client_id: client_id.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Build a revision from the wire form sent with a request for `resource_id`.
    /// A missing client id becomes the empty marker.
    pub fn from_dto(dto: &RevisionDto, resource_id: impl Into<String>) -> Self {
        Self::new(
            dto.version,
            dto.client_id.clone().unwrap_or_default(),
            resource_id,
        )
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// True when the claim carries no version and skips the staleness check.
    pub fn is_unconditional(&self) -> bool {
        self.version.is_none()
    }

    /// Does this claim hold against the stored version?
    pub fn matches(&self, current: u64) -> bool {
        self.version.map_or(true, |v| v == current)
    }

    /// Mint the revision that follows a successful mutation at `current`.
    /// A client that did not identify itself is given a fresh id.
    pub fn next(&self, current: u64) -> Revision {
        let client_id = if self.client_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            self.client_id.clone()
        };
        Revision::new(Some(current + 1), client_id, self.resource_id.clone())
    }

    pub fn to_dto(&self) -> RevisionDto {
        RevisionDto {
            version: self.version,
            client_id: if self.client_id.is_empty() {
                None
            } else {
                Some(self.client_id.clone())
            },
        }
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.version {
            Some(v) => write!(f, "{}@{}", self.resource_id, v),
            None => write!(f, "{}@*", self.resource_id),
        }
    }
}

/// Revision as carried in request and response bodies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// A piece of state together with the revision it was observed at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub state: T,
    pub revision: Revision,
}

impl<T> Versioned<T> {
    pub fn new(state: T, revision: Revision) -> Self {
        Self { state, revision }
    }
}
