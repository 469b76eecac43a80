use cms_common::ActivityLogEntry;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning record id in canonical string form. Kept as text, not a foreign key.
    #[sea_orm(indexed)]
    pub correspondence_id: String,

    pub user_id: Option<Uuid>,
    pub action: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub timestamp: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ActivityLogEntry {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            correspondence_id: m.correspondence_id,
            user_id: m.user_id,
            action: m.action,
            description: m.description,
            timestamp: m.timestamp,
        }
    }
}
