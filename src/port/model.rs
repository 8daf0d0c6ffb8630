//! Input port resource and its wire forms

use serde::{Deserialize, Serialize};

use crate::common::config::PortSeed;
use crate::common::utils::resource_uri;
use crate::common::{RevisionDto, Versioned};
use crate::coordinator::handler::{Identified, UpdateRequest};

/// URI collection segment for input ports
pub const COLLECTION: &str = "input-ports";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Running,
    #[default]
    Stopped,
    Disabled,
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Running => write!(f, "running"),
            PortState::Stopped => write!(f, "stopped"),
            PortState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Stored port state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    pub name: String,
    pub comments: String,
    pub state: PortState,
    pub concurrent_tasks: u32,
}

impl From<PortSeed> for Port {
    fn from(seed: PortSeed) -> Self {
        Self {
            id: seed.id,
            name: seed.name,
            comments: seed.comments,
            state: seed.state,
            concurrent_tasks: seed.concurrent_tasks,
        }
    }
}

/// Proposed changes to a port; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDto {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PortState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_tasks: Option<u32>,
}

impl Identified for PortDto {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl PortDto {
    /// Does applying this proposal change anything besides the run state?
    pub fn changes_configuration(&self, current: &Port) -> bool {
        self.name.as_ref().is_some_and(|n| *n != current.name)
            || self.comments.as_ref().is_some_and(|c| *c != current.comments)
            || self
                .concurrent_tasks
                .is_some_and(|t| t != current.concurrent_tasks)
    }

    pub fn apply_to(&self, port: &mut Port) {
        if let Some(name) = &self.name {
            port.name = name.clone();
        }
        if let Some(comments) = &self.comments {
            port.comments = comments.clone();
        }
        if let Some(state) = self.state {
            port.state = state;
        }
        if let Some(tasks) = self.concurrent_tasks {
            port.concurrent_tasks = tasks;
        }
    }
}

/// Request and response envelope for a port
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<RevisionDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<serde_json::Value>,
}

impl PortEntity {
    /// Response entity for `port`, with its resource URI populated
    pub fn from_versioned(versioned: &Versioned<Port>, base_url: &str) -> Self {
        let port = &versioned.state;
        Self {
            revision: Some(versioned.revision.to_dto()),
            id: Some(port.id.clone()),
            uri: Some(resource_uri(base_url, COLLECTION, &port.id)),
            component: serde_json::to_value(port).ok(),
        }
    }

    /// Interpret this entity as an update request body
    pub fn into_update(self) -> serde_json::Result<UpdateRequest<PortDto>> {
        let component = self.component.map(serde_json::from_value).transpose()?;
        Ok(UpdateRequest {
            revision: self.revision,
            component,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Revision;

    fn port() -> Port {
        Port {
            id: "p1".into(),
            name: "ingest".into(),
            comments: String::new(),
            state: PortState::Stopped,
            concurrent_tasks: 1,
        }
    }

    #[test]
    fn test_changes_configuration() {
        let current = port();
        let state_only = PortDto {
            id: Some("p1".into()),
            state: Some(PortState::Running),
            ..Default::default()
        };
        assert!(!state_only.changes_configuration(&current));

        let same_name = PortDto {
            name: Some("ingest".into()),
            ..Default::default()
        };
        assert!(!same_name.changes_configuration(&current));

        let rename = PortDto {
            name: Some("other".into()),
            ..Default::default()
        };
        assert!(rename.changes_configuration(&current));
    }

    #[test]
    fn test_entity_shape() {
        let versioned = Versioned::new(port(), Revision::new(Some(4), "c1", "p1"));
        let entity = PortEntity::from_versioned(&versioned, "http://node:8080/");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["revision"]["version"], 4);
        assert_eq!(json["revision"]["clientId"], "c1");
        assert_eq!(json["uri"], "http://node:8080/input-ports/p1");
        assert_eq!(json["component"]["concurrentTasks"], 1);
        assert_eq!(json["component"]["state"], "stopped");
    }

    #[test]
    fn test_into_update() {
        let entity: PortEntity = serde_json::from_str(
            r#"{"revision": {"version": 3}, "component": {"id": "p1", "name": "renamed"}}"#,
        )
        .unwrap();
        let update = entity.into_update().unwrap();
        assert_eq!(update.revision.unwrap().version, Some(3));
        let dto = update.component.unwrap();
        assert_eq!(dto.id(), Some("p1"));
        assert_eq!(dto.name.as_deref(), Some("renamed"));
        assert_eq!(dto.state, None);
    }
}
