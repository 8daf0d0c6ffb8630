//! Audit trail for mutations and authorization denials
//!
//! Records are JSON lines appended to an optional file and always emitted on
//! the `audit` tracing target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::common::auth::Principal;
use crate::common::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    ResourceUpdated {
        kind: String,
        resource_id: String,
        version: Option<u64>,
    },
    ResourceDeleted {
        kind: String,
        resource_id: String,
        unconditional: bool,
    },
    AuthorizationDenied {
        resource_id: String,
        reason: String,
    },
}

/// One line of the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
    pub principal: String,
    #[serde(flatten)]
    pub event: AuditEvent,
}

#[derive(Default)]
pub struct AuditLogger {
    sink: Option<Mutex<LineWriter<File>>>,
}

impl AuditLogger {
    /// Logger that only emits tracing events
    pub fn tracing_only() -> Self {
        Self { sink: None }
    }

    /// Logger appending to `path`, created if missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            sink: Some(Mutex::new(LineWriter::new(file))),
        })
    }

    pub fn record(&self, principal: &Principal, event: AuditEvent) {
        let record = AuditRecord {
            at: Utc::now(),
            principal: principal.identity.clone(),
            event,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("audit record not serializable: {}", e);
                return;
            }
        };

        tracing::info!(target: "audit", "{}", line);
        if let Some(sink) = &self.sink {
            let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = writeln!(sink, "{}", line) {
                tracing::error!("audit log write failed: {}", e);
            }
        }
    }
}
