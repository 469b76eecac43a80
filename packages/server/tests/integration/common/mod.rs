use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use cms_common::memory::MemoryRecordStore;
use cms_common::storage::memory::MemoryBlobStore;
use cms_common::{CorrespondenceRecord, CorrespondenceStatus};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use uuid::Uuid;

use cms_server::config::AppConfig;
use cms_server::session::SessionHub;
use cms_server::state::AppState;
use cms_server::stores::MemorySessionStore;

pub const SECRET: &str = "test-secret-for-integration-tests";
pub const PASSWORD: &str = "s3cure-pass";

pub mod routes {
    use uuid::Uuid;

    pub const SIGN_IN: &str = "/api/v1/auth/sign-in";
    pub const SIGN_UP: &str = "/api/v1/auth/sign-up";
    pub const FORGOT_PASSWORD: &str = "/api/v1/auth/forgot-password";
    pub const SESSION: &str = "/api/v1/auth/session";
    pub const SIGN_OUT: &str = "/api/v1/auth/sign-out";
    pub const REFRESH: &str = "/api/v1/auth/refresh";
    pub const PASSWORD: &str = "/api/v1/auth/password";
    pub const OAUTH_CALLBACK: &str = "/api/v1/auth/oauth/callback";
    pub const EVENTS: &str = "/api/v1/auth/events";

    pub fn oauth(provider: &str) -> String {
        format!("/api/v1/auth/oauth/{provider}")
    }

    pub const CORRESPONDENCE: &str = "/api/v1/correspondence";

    pub fn correspondence(id: Uuid) -> String {
        format!("/api/v1/correspondence/{id}")
    }

    pub fn correspondence_status(id: Uuid) -> String {
        format!("/api/v1/correspondence/{id}/status")
    }

    pub fn correspondence_activity(id: Uuid) -> String {
        format!("/api/v1/correspondence/{id}/activity")
    }

    pub fn attachment(id: Uuid, filename: &str) -> String {
        format!("/api/v1/correspondence/{id}/attachments/{filename}")
    }

    pub const UPLOAD: &str = "/api/upload";
}

/// A running test server backed by in-memory stores.
pub struct TestApp {
    pub addr: SocketAddr,
    /// Keeps cookies between requests, like a browser.
    pub client: Client,
    pub auth: Arc<MemorySessionStore>,
    pub records: Arc<MemoryRecordStore>,
    pub blobs: Arc<MemoryBlobStore>,
    /// The server's live session contexts.
    pub sessions: SessionHub,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// `Set-Cookie` headers, raw.
    pub cookies: Vec<String>,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with a tweaked configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::in_memory(SECRET);
        configure(&mut config);

        let auth = Arc::new(MemorySessionStore::new(SECRET, Duration::hours(1)));
        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let state = AppState::new(config, auth.clone(), records.clone(), blobs.clone());
        let sessions = state.sessions.clone();

        let app = cms_server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to build client"),
            auth,
            records,
            blobs,
            sessions,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn patch_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PATCH request");

        TestResponse::from_response(res).await
    }

    pub async fn put_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");

        TestResponse::from_response(res).await
    }

    /// Open a streaming GET, returning the response before its body is read.
    pub async fn stream_with_token(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "text/event-stream")
            .send()
            .await
            .expect("Failed to open stream")
    }

    pub async fn multipart_with_token(&self, path: &str, form: Form, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart request");

        TestResponse::from_response(res).await
    }

    /// Register a confirmed user and sign in, returning the access token.
    pub async fn signed_in_user(&self, email: &str) -> String {
        self.auth.add_user(email, PASSWORD, true);

        let res = self
            .post_without_token(
                routes::SIGN_IN,
                &serde_json::json!({"email": email, "password": PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 200, "Sign-in failed: {}", res.text);

        res.body["access_token"]
            .as_str()
            .expect("Sign-in response should contain an access token")
            .to_string()
    }

    /// Put a record straight into the store and return its id.
    pub async fn seed_record(&self, n: u32, subject: &str, status: CorrespondenceStatus) -> Uuid {
        let record = record(n, subject, status);
        let id = record.id;
        self.records.seed(record).await;
        id
    }
}

/// Read body chunks into `seen` until it contains `needle`.
pub async fn read_until(res: &mut reqwest::Response, seen: &mut String, needle: &str) {
    let deadline = std::time::Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        while !seen.contains(needle) {
            let chunk = res
                .chunk()
                .await
                .expect("Stream failed")
                .expect("Stream ended early");
            seen.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for {needle:?} in {seen:?}"));
}

/// A record created `n` hours into 2024-06-01.
pub fn record(n: u32, subject: &str, status: CorrespondenceStatus) -> CorrespondenceRecord {
    CorrespondenceRecord {
        id: Uuid::now_v7(),
        registry_number: format!("CMS-{n:04}"),
        subject: subject.into(),
        sender: "Finance Dept".into(),
        recipient: "Director".into(),
        department: "General".into(),
        date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        status,
        description: String::new(),
        created_by: None,
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(n.into()),
        updated_at: None,
        updated_by: None,
    }
}

/// A complete create form without files.
pub fn intake_form(subject: &str) -> Form {
    Form::new()
        .text("subject", subject.to_string())
        .text("sender", "Finance Dept")
        .text("recipient", "Director")
        .text("date", "2024-06-01")
}

pub fn file_part(name: &str, bytes: &[u8]) -> Part {
    Part::bytes(bytes.to_vec())
        .file_name(name.to_string())
        .mime_str("application/pdf")
        .expect("Failed to set MIME type")
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let cookies = res
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            cookies,
            text,
            body,
        }
    }

    /// The `Set-Cookie` header for `name`, if one was sent.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.cookies
            .iter()
            .find(|c| c.starts_with(&prefix))
            .map(String::as_str)
    }
}
