use std::sync::Arc;

use cms_common::storage::BlobStore;
use cms_common::store::{RecordStore, SessionStore};

use crate::config::AppConfig;
use crate::session::SessionHub;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth: Arc<dyn SessionStore>,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub sessions: SessionHub,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        auth: Arc<dyn SessionStore>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config,
            auth,
            records,
            blobs,
            sessions: SessionHub::new(),
        }
    }
}
