//! Integration tests for Pic Profile Maker.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p picmaker-integration-tests
//! ```
//!
//! The full router runs in-process against [`MemoryStore`] and a
//! [`StubEngine`], with storage under a temporary directory. No database or
//! processing program is needed.
//!
//! # Test Categories
//!
//! - `anonymous_pictures` - free tiers, daily limit, input validation
//! - `authenticated_pictures` - bearer tokens, stored pictures, disabled accounts
//! - `users` - registration, login, profile, rate limiting
//! - `service` - home page, health checks, request ids
//! - `quota_race` - concurrent requests from one origin

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use picmaker_server::config::{
    EngineConfig, PicsConfig, QuotaConfig, SentryConfig, StorageConfig, TokenConfig, UploadConfig,
};
use picmaker_server::db::MemoryStore;
use picmaker_server::routes;
use picmaker_server::services::engine::{Artifact, EngineError, EngineJob, PictureEngine};
use picmaker_server::state::AppState;

/// Signing key used by every test app.
pub const TEST_SECRET: &str = "Qm7vR2xK9pL4wN8sT3yB6cF1hJ5dG0zA";

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "picmaker-test-boundary";

/// Stand-in bytes for an uploaded photo.
pub const JPEG_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0 not really a photo";

// =============================================================================
// Stub engine
// =============================================================================

/// How the stub engine answers.
#[derive(Clone)]
pub enum EngineMode {
    /// Writes a picture when the requested face is within the first `n`.
    Faces(usize),
    /// Reports that the upload contains no face.
    NoFace,
    /// Fails with an internal error.
    Fail,
    /// Waits on the barrier, then behaves like `Faces(1)`.
    Gate(Arc<tokio::sync::Barrier>),
}

/// Engine double that records calls and writes a small fake PNG.
pub struct StubEngine {
    mode: EngineMode,
    calls: AtomicUsize,
}

impl StubEngine {
    #[must_use]
    pub const fn new(mode: EngineMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of jobs received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn produce(job: &EngineJob, faces: usize) -> Result<Artifact, EngineError> {
        let requested = job.face_index.one_based();
        if requested > faces {
            return Err(EngineError::FaceOutOfRange {
                requested,
                detected: faces,
            });
        }
        let contents = format!("\u{89}PNG {} {}", job.dimension, job.colors.center.to_hex());
        tokio::fs::write(&job.output, contents)
            .await
            .map_err(|e| EngineError::Failed(e.to_string()))?;
        Ok(Artifact {
            path: job.output.clone(),
            faces,
        })
    }
}

#[async_trait]
impl PictureEngine for StubEngine {
    async fn process(&self, job: &EngineJob) -> Result<Artifact, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            EngineMode::Faces(faces) => Self::produce(job, *faces).await,
            EngineMode::NoFace => Err(EngineError::NoFaceDetected),
            EngineMode::Fail => Err(EngineError::Failed("stub engine failure".to_owned())),
            EngineMode::Gate(barrier) => {
                barrier.wait().await;
                Self::produce(job, 1).await
            }
        }
    }
}

// =============================================================================
// Test app
// =============================================================================

/// Knobs for a [`TestApp`].
#[derive(Clone)]
pub struct TestOptions {
    pub daily_limit: u64,
    pub uploads: UploadConfig,
    pub engine: EngineMode,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            daily_limit: 5,
            uploads: UploadConfig {
                free_max_bytes: 1024,
                user_max_bytes: 4096,
            },
            engine: EngineMode::Faces(1),
        }
    }
}

/// A response with its body already read.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Body parsed as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    /// `detail` field of a JSON error body.
    #[must_use]
    pub fn detail(&self) -> String {
        self.json()["detail"].as_str().unwrap_or_default().to_owned()
    }

    /// Header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The full router over in-memory dependencies.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub engine: Arc<StubEngine>,
    pub storage: StorageConfig,
    next_ip: AtomicU32,
    _root: TempDir,
}

impl TestApp {
    /// App with default options.
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    /// App with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the temporary storage cannot be created.
    pub async fn with_options(options: TestOptions) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let storage = StorageConfig::under(root.path());

        let config = PicsConfig {
            database_url: SecretString::from("postgres://unused"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            token: TokenConfig {
                secret: SecretString::from(TEST_SECRET),
                ttl: Duration::from_secs(30 * 60),
            },
            quota: QuotaConfig::uniform(options.daily_limit),
            uploads: options.uploads,
            storage: storage.clone(),
            engine: EngineConfig {
                program: PathBuf::from("unused"),
                timeout: Duration::from_secs(1),
            },
            sentry: SentryConfig::default(),
        };

        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(StubEngine::new(options.engine));
        let state = AppState::new(config, store.clone(), store.clone(), engine.clone());
        state
            .pictures()
            .scope()
            .prepare()
            .await
            .expect("failed to prepare storage");

        Self {
            router: routes::app(state),
            store,
            engine,
            storage,
            next_ip: AtomicU32::new(1),
            _root: root,
        }
    }

    /// A client address not used by any earlier call on this app.
    pub fn fresh_ip(&self) -> String {
        let n = self.next_ip.fetch_add(1, Ordering::SeqCst);
        Ipv4Addr::from(0x0A00_0000 | n).to_string()
    }

    /// Send one request through the router.
    ///
    /// # Panics
    ///
    /// Panics if the body cannot be read.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// `GET path` with no extra headers.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(request(Method::GET, path).body(Body::empty()).expect("valid request"))
            .await
    }

    /// `POST /users/new_user` from a fresh address.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> TestResponse {
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
        self.register_raw(&body.to_string(), &self.fresh_ip()).await
    }

    /// `POST /users/new_user` with a raw JSON body.
    pub async fn register_raw(&self, body: &str, ip: &str) -> TestResponse {
        self.send(
            request(Method::POST, "/users/new_user")
                .header("x-forwarded-for", ip)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_owned()))
                .expect("valid request"),
        )
        .await
    }

    /// `POST /users/token` from `ip`.
    pub async fn login_from(&self, email: &str, password: &str, ip: &str) -> TestResponse {
        let form = format!(
            "grant_type=password&username={}&password={}",
            form_encode(email),
            form_encode(password)
        );
        self.send(
            request(Method::POST, "/users/token")
                .header("x-forwarded-for", ip)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .expect("valid request"),
        )
        .await
    }

    /// `POST /users/token` from a fresh address.
    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.login_from(email, password, &self.fresh_ip()).await
    }

    /// Register an account and return a bearer token for it.
    ///
    /// # Panics
    ///
    /// Panics if registration or login fails.
    pub async fn token_for(&self, email: &str) -> String {
        let password = "correct horse";
        let registered = self.register("Test User", email, password).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);
        let login = self.login(email, password).await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
        login.json()["access_token"]
            .as_str()
            .expect("token in response")
            .to_owned()
    }

    /// `POST /pictures/example/{tier}{query}` from `ip`.
    pub async fn example(&self, tier: &str, query: &str, ip: &str, upload: &TestUpload) -> TestResponse {
        let uri = format!("/pictures/example/{tier}{query}");
        self.send(
            multipart_request(&uri)
                .header("x-forwarded-for", ip)
                .body(Body::from(upload.body()))
                .expect("valid request"),
        )
        .await
    }

    /// `POST /pictures/mypicture/{tier}{query}`, optionally with a bearer token.
    pub async fn my_picture(
        &self,
        tier: &str,
        query: &str,
        token: Option<&str>,
        upload: &TestUpload,
    ) -> TestResponse {
        let uri = format!("/pictures/mypicture/{tier}{query}");
        let mut builder = multipart_request(&uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(upload.body())).expect("valid request"))
            .await
    }

    /// Files currently under a storage directory, recursively.
    #[must_use]
    pub fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return files;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(Self::files_under(&path));
            } else {
                files.push(path);
            }
        }
        files.sort();
        files
    }

    /// Entries left in the staging directory.
    #[must_use]
    pub fn staged_entries(&self) -> usize {
        std::fs::read_dir(&self.storage.staging_dir).map_or(0, Iterator::count)
    }
}

// =============================================================================
// Request builders
// =============================================================================

/// One multipart upload.
#[derive(Debug, Clone)]
pub struct TestUpload {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl TestUpload {
    /// A small JPEG in the `picture_file` field.
    #[must_use]
    pub fn jpeg() -> Self {
        Self {
            field: "picture_file".to_owned(),
            file_name: "me.jpg".to_owned(),
            content_type: "image/jpeg".to_owned(),
            bytes: JPEG_BYTES.to_vec(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_owned();
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.bytes = vec![0xAB; size];
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: &str) -> Self {
        self.field = field.to_owned();
        self
    }

    /// Encoded multipart body.
    #[must_use]
    pub fn body(&self) -> Vec<u8> {
        multipart_body(&self.field, &self.file_name, &self.content_type, &self.bytes)
    }
}

/// Build a single-field `multipart/form-data` body.
#[must_use]
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

fn multipart_request(uri: &str) -> axum::http::request::Builder {
    request(Method::POST, uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    )
}

/// Minimal `application/x-www-form-urlencoded` escaping for test values.
fn form_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                char::from(b).to_string()
            }
            b' ' => "+".to_owned(),
            other => format!("%{other:02X}"),
        })
        .collect()
}
