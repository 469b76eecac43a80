use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::correspondence_status::CorrespondenceStatus;

/// Department assigned when the form leaves it blank.
pub const DEFAULT_DEPARTMENT: &str = "General";

/// A registered piece of incoming or outgoing correspondence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CorrespondenceRecord {
    /// Store-generated identifier.
    pub id: Uuid,
    /// Human-facing registry number, e.g. `CMS-1718000000000`.
    #[schema(example = "CMS-1718000000000")]
    pub registry_number: String,
    #[schema(example = "Budget Review")]
    pub subject: String,
    #[schema(example = "Finance Dept")]
    pub sender: String,
    #[schema(example = "Director")]
    pub recipient: String,
    #[schema(example = "General")]
    pub department: String,
    /// Date written on the correspondence.
    pub date: NaiveDate,
    pub status: CorrespondenceStatus,
    /// Free-text body. Older payloads call this `message_content`.
    #[serde(alias = "message_content")]
    pub description: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Uuid>,
}

/// Fields required to insert a new record. The store assigns `id` and `created_at`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCorrespondence {
    pub registry_number: String,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub department: String,
    pub date: NaiveDate,
    pub status: CorrespondenceStatus,
    pub description: String,
    pub created_by: Option<Uuid>,
}

impl NewCorrespondence {
    /// Materialize the record with store-assigned identity.
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> CorrespondenceRecord {
        CorrespondenceRecord {
            id,
            registry_number: self.registry_number,
            subject: self.subject,
            sender: self.sender,
            recipient: self.recipient,
            department: self.department,
            date: self.date,
            status: self.status,
            description: self.description,
            created_by: self.created_by,
            created_at,
            updated_at: None,
            updated_by: None,
        }
    }
}

/// A status change to apply to an existing record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub status: CorrespondenceStatus,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}
