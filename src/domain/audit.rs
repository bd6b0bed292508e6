use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ============================================================================
// Audit Log - per-property change history
// ============================================================================

/// One property that changed in a single update.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub property: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl PropertyChange {
    /// Returns a change only when the values differ.
    pub fn between<T: ToString + PartialEq>(
        property: &str,
        old: Option<&T>,
        new: Option<&T>,
    ) -> Option<Self> {
        if old == new {
            return None;
        }
        Some(Self {
            property: property.to_string(),
            old_value: old.map(ToString::to_string),
            new_value: new.map(ToString::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: String,
    pub author_id: Uuid,
    pub changed_property: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub commit_date: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn record(
        entity_type: &str,
        entity_id: Uuid,
        author_id: Uuid,
        change: PropertyChange,
        commit_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            entity_type: entity_type.to_string(),
            author_id,
            changed_property: change.property,
            old_value: change.old_value,
            new_value: change.new_value,
            commit_date,
        }
    }
}

/// Filters accepted by the audit log endpoint.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub author_id: Option<Uuid>,
    pub changed_property: Option<String>,
}

impl AuditLogFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.author_id.map_or(true, |author| entry.author_id == author)
            && self
                .changed_property
                .as_deref()
                .map_or(true, |property| entry.changed_property == property)
    }
}
