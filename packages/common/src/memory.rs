//! In-process record store used by tests and the `memory` backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::activity::{ActivityLogEntry, NewActivity};
use crate::correspondence::{CorrespondenceRecord, NewCorrespondence, StatusChange};
use crate::search::SearchQuery;
use crate::store::{RecordStore, StoreError};

#[derive(Default)]
struct Tables {
    correspondence: Vec<CorrespondenceRecord>,
    activity_log: Vec<ActivityLogEntry>,
}

#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
    fail_activity: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls served so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make activity reads and writes fail while record calls keep working.
    pub fn fail_activity(&self, fail: bool) {
        self.fail_activity.store(fail, Ordering::SeqCst);
    }

    /// Insert a fully formed record, bypassing id assignment.
    pub async fn seed(&self, record: CorrespondenceRecord) {
        self.tables.write().await.correspondence.push(record);
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.correspondence.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("record store is offline".into()));
        }
        Ok(())
    }

    fn enter_activity(&self) -> Result<(), StoreError> {
        self.enter()?;
        if self.fail_activity.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("activity_log is not writable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CorrespondenceRecord>, StoreError> {
        self.enter()?;
        Ok(query.apply(&self.tables.read().await.correspondence))
    }

    async fn get(&self, id: Uuid) -> Result<Option<CorrespondenceRecord>, StoreError> {
        self.enter()?;
        Ok(self
            .tables
            .read()
            .await
            .correspondence
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn insert(&self, record: NewCorrespondence) -> Result<CorrespondenceRecord, StoreError> {
        self.enter()?;
        let record = record.into_record(Uuid::now_v7(), Utc::now());
        self.tables.write().await.correspondence.push(record.clone());
        Ok(record)
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Option<CorrespondenceRecord>, StoreError> {
        self.enter()?;
        let mut tables = self.tables.write().await;
        let Some(record) = tables.correspondence.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        record.status = change.status;
        record.updated_at = Some(change.updated_at);
        record.updated_by = change.updated_by;
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.enter()?;
        let mut tables = self.tables.write().await;
        let before = tables.correspondence.len();
        tables.correspondence.retain(|r| r.id != id);
        let removed = tables.correspondence.len() != before;
        if removed {
            let key = id.to_string();
            tables.activity_log.retain(|e| e.correspondence_id != key);
        }
        Ok(removed)
    }

    async fn insert_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError> {
        self.enter_activity()?;
        let entry = entry.into_entry(Uuid::now_v7());
        self.tables.write().await.activity_log.push(entry.clone());
        Ok(entry)
    }

    async fn list_activity(
        &self,
        correspondence_id: &str,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        self.enter_activity()?;
        let mut entries: Vec<_> = self
            .tables
            .read()
            .await
            .activity_log
            .iter()
            .filter(|e| e.correspondence_id == correspondence_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(entries)
    }
}
