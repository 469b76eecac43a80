use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action recorded when a record is registered.
pub const ACTION_CREATED: &str = "Created correspondence";
/// Action recorded when a record's status changes.
pub const ACTION_STATUS_UPDATED: &str = "Updated status";

/// Append-only audit entry attached to a correspondence record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    /// Id of the owning record, in canonical string form.
    pub correspondence_id: String,
    pub user_id: Option<Uuid>,
    #[schema(example = "Created correspondence")]
    pub action: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// An activity entry before the store assigns its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewActivity {
    pub correspondence_id: String,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl NewActivity {
    pub fn new(
        correspondence_id: Uuid,
        user_id: Option<Uuid>,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            correspondence_id: correspondence_id.to_string(),
            user_id,
            action: action.into(),
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn into_entry(self, id: Uuid) -> ActivityLogEntry {
        ActivityLogEntry {
            id,
            correspondence_id: self.correspondence_id,
            user_id: self.user_id,
            action: self.action,
            description: self.description,
            timestamp: self.timestamp,
        }
    }
}
