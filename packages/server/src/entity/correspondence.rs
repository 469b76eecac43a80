use cms_common::{CorrespondenceRecord, CorrespondenceStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "correspondence")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Not unique: user-supplied numbers are stored verbatim.
    pub registry_number: String,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub department: String,

    /// Date written on the correspondence.
    pub date: Date,
    pub status: CorrespondenceStatus,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub created_by: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
    pub updated_by: Option<Uuid>,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for CorrespondenceRecord {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            registry_number: m.registry_number,
            subject: m.subject,
            sender: m.sender,
            recipient: m.recipient,
            department: m.department,
            date: m.date,
            status: m.status,
            description: m.description,
            created_by: m.created_by,
            created_at: m.created_at,
            updated_at: m.updated_at,
            updated_by: m.updated_by,
        }
    }
}
