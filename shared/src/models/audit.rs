//! Append-only audit trail entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Component;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(AuditOutcome::Success),
            "failure" => Some(AuditOutcome::Failure),
            _ => None,
        }
    }
}

/// One recorded state transition or rejected call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub component: Component,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub outcome: AuditOutcome,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub detail: Option<String>,
}

impl AuditEntry {
    fn new(
        component: Component,
        entity_type: &str,
        entity_id: impl ToString,
        action: &str,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            component,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            outcome,
            before: None,
            after: None,
            detail: None,
        }
    }

    pub fn success(
        component: Component,
        entity_type: &str,
        entity_id: impl ToString,
        action: &str,
    ) -> Self {
        Self::new(component, entity_type, entity_id, action, AuditOutcome::Success)
    }

    pub fn failure(
        component: Component,
        entity_type: &str,
        entity_id: impl ToString,
        action: &str,
    ) -> Self {
        Self::new(component, entity_type, entity_id, action, AuditOutcome::Failure)
    }

    /// Snapshot of the entity before the transition. Values that fail to
    /// serialize are left out.
    pub fn with_before<T: Serialize>(mut self, value: &T) -> Self {
        self.before = serde_json::to_value(value).ok();
        self
    }

    pub fn with_after<T: Serialize>(mut self, value: &T) -> Self {
        self.after = serde_json::to_value(value).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Audit query. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditFilter {
    pub component: Option<Component>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

impl AuditFilter {
    pub fn component(component: Component) -> Self {
        Self {
            component: Some(component),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.component.map_or(true, |c| c == entry.component)
            && self
                .entity_type
                .as_deref()
                .map_or(true, |t| t == entry.entity_type)
            && self
                .entity_id
                .as_deref()
                .map_or(true, |id| id == entry.entity_id)
    }
}
