use async_trait::async_trait;
use chrono::Utc;
use cms_common::search::{SearchQuery, SortKey, StatusFilter};
use cms_common::store::{RecordStore, StoreError};
use cms_common::{
    ActivityLogEntry, CorrespondenceRecord, NewActivity, NewCorrespondence, StatusChange,
};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, ExprTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{activity_log, correspondence};
use crate::models::shared::escape_like;

/// Record store over the `correspondence` and `activity_log` tables.
#[derive(Clone)]
pub struct PostgresRecordStore {
    db: DatabaseConnection,
}

impl PostgresRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn store_err(err: DbErr) -> StoreError {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Internal(other.to_string()),
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    #[instrument(skip(self))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CorrespondenceRecord>, StoreError> {
        let mut select = correspondence::Entity::find();

        if let StatusFilter::Only(status) = query.status {
            select = select.filter(correspondence::Column::Status.eq(status));
        }
        if let Some(from) = query.date_from {
            select = select.filter(correspondence::Column::Date.gte(from));
        }
        if let Some(to) = query.date_to {
            select = select.filter(correspondence::Column::Date.lte(to));
        }

        if let Some(needle) = query.needle() {
            let pattern = format!("%{}%", escape_like(&needle));
            let contains = |column: correspondence::Column| {
                Expr::expr(Func::lower(Expr::col(column)))
                    .like(LikeExpr::new(pattern.clone()).escape('\\'))
            };
            select = select.filter(
                Condition::any()
                    .add(contains(correspondence::Column::Subject))
                    .add(contains(correspondence::Column::Sender))
                    .add(contains(correspondence::Column::Recipient))
                    .add(contains(correspondence::Column::RegistryNumber)),
            );
        }

        select = match query.sort {
            SortKey::Newest => select.order_by_desc(correspondence::Column::CreatedAt),
            SortKey::Oldest => select.order_by_asc(correspondence::Column::CreatedAt),
            SortKey::Subject => select
                .order_by_asc(correspondence::Column::Subject)
                .order_by_desc(correspondence::Column::CreatedAt),
        }
        .order_by_asc(correspondence::Column::Id);

        let mut records: Vec<CorrespondenceRecord> = select
            .all(&self.db)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(CorrespondenceRecord::from)
            .collect();

        // Database collation may order subjects differently.
        records.sort_by(|a, b| query.sort.compare(a, b));
        Ok(records)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CorrespondenceRecord>, StoreError> {
        Ok(correspondence::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(CorrespondenceRecord::from))
    }

    #[instrument(skip(self, record), fields(registry_number = %record.registry_number))]
    async fn insert(&self, record: NewCorrespondence) -> Result<CorrespondenceRecord, StoreError> {
        let model = correspondence::ActiveModel {
            id: Set(Uuid::now_v7()),
            registry_number: Set(record.registry_number),
            subject: Set(record.subject),
            sender: Set(record.sender),
            recipient: Set(record.recipient),
            department: Set(record.department),
            date: Set(record.date),
            status: Set(record.status),
            description: Set(record.description),
            created_by: Set(record.created_by),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            updated_by: Set(None),
        };
        let saved = model.insert(&self.db).await.map_err(store_err)?;
        Ok(saved.into())
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Option<CorrespondenceRecord>, StoreError> {
        let Some(model) = correspondence::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(store_err)?
        else {
            return Ok(None);
        };

        let mut active: correspondence::ActiveModel = model.into();
        active.status = Set(change.status);
        active.updated_at = Set(Some(change.updated_at));
        active.updated_by = Set(change.updated_by);
        let updated = active.update(&self.db).await.map_err(store_err)?;
        Ok(Some(updated.into()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;
        activity_log::Entity::delete_many()
            .filter(activity_log::Column::CorrespondenceId.eq(id.to_string()))
            .exec(&txn)
            .await
            .map_err(store_err)?;
        let result = correspondence::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(store_err)?;
        txn.commit().await.map_err(store_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError> {
        let model = activity_log::ActiveModel {
            id: Set(Uuid::now_v7()),
            correspondence_id: Set(entry.correspondence_id),
            user_id: Set(entry.user_id),
            action: Set(entry.action),
            description: Set(entry.description),
            timestamp: Set(entry.timestamp),
        };
        let saved = model.insert(&self.db).await.map_err(store_err)?;
        Ok(saved.into())
    }

    async fn list_activity(
        &self,
        correspondence_id: &str,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        Ok(activity_log::Entity::find()
            .filter(activity_log::Column::CorrespondenceId.eq(correspondence_id))
            .order_by_desc(activity_log::Column::Timestamp)
            .order_by_desc(activity_log::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(ActivityLogEntry::from)
            .collect())
    }
}
