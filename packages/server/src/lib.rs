pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod stores;
pub mod utils;

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use cms_common::memory::MemoryRecordStore;
use cms_common::storage::BlobStore;
use cms_common::storage::memory::MemoryBlobStore;
use cms_common::storage::s3::{S3BlobStore, S3Settings};
use cms_common::store::{RecordStore, SessionStore};
use tracing::info;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};

use crate::config::{AppConfig, AuthBackend, RecordsBackend, StorageBackend};
use crate::state::AppState;
use crate::stores::{GoTrueSessionStore, MemorySessionStore, PostgresRecordStore};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Correspondence Management API",
        version = "1.0.0",
        description = "Register, search and track incoming and outgoing correspondence"
    ),
    tags(
        (name = "Auth", description = "Sign-in, registration and session lifecycle"),
        (name = "Correspondence", description = "Correspondence records, attachments and activity"),
        (name = "Upload", description = "Standalone file upload"),
    ),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes())
        .split_for_parts();

    router
        .with_state(state)
        .merge(Scalar::with_url("/scalar", api))
}

/// Connect the configured backends and assemble the shared state.
pub async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let auth: Arc<dyn SessionStore> = match config.auth.backend {
        AuthBackend::Gotrue => {
            info!(url = %config.auth.url, "Using GoTrue session store");
            Arc::new(
                GoTrueSessionStore::new(&config.auth.url, &config.auth.anon_key)
                    .context("Failed to create session store client")?,
            )
        }
        AuthBackend::Memory => {
            info!("Using in-memory session store");
            let ttl = Duration::seconds(i64::try_from(config.auth.token_ttl_secs).unwrap_or(3600));
            Arc::new(MemorySessionStore::new(config.auth.jwt_secret.clone(), ttl))
        }
    };

    let records: Arc<dyn RecordStore> = match config.records.backend {
        RecordsBackend::Postgres => {
            let db = database::init_db(&config.database)
                .await
                .context("Failed to connect to database")?;
            Arc::new(PostgresRecordStore::new(db))
        }
        RecordsBackend::Memory => {
            info!("Using in-memory record store");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let blobs: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackend::S3 => {
            let storage = &config.storage;
            let settings = S3Settings {
                bucket: storage.bucket.clone(),
                region: storage.region.clone(),
                endpoint: storage.endpoint.clone(),
                access_key: storage.access_key.clone(),
                secret_key: storage.secret_key.clone(),
                public_base_url: storage.public_base_url.clone(),
            };
            info!(bucket = %settings.bucket, "Using S3 blob store");
            Arc::new(S3BlobStore::new(&settings).context("Failed to create blob store")?)
        }
        StorageBackend::Memory => {
            info!("Using in-memory blob store");
            Arc::new(MemoryBlobStore::default())
        }
    };

    Ok(AppState::new(config, auth, records, blobs))
}
