#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_video_backend::config::Config;
use rust_video_backend::infrastructure::database;
use rust_video_backend::services::media::{MediaToolError, MediaToolRunner, StreamInfo};
use rust_video_backend::services::storage::StorageService;
use rust_video_backend::services::upload::UploadService;
use rust_video_backend::{AppState, create_app};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

/// In-memory stand-in for the S3 gateway. Keys map to (content type, bytes).
pub struct MockStorageService {
    pub objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn upload_file_from_path(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> anyhow::Result<()> {
        let data = tokio::fs::read(path).await?;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), data));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> anyhow::Result<String> {
        Ok(format!(
            "https://{}.s3.example.com/{}?X-Amz-Expires={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }
}

/// Scriptable stand-in for the ffprobe/ffmpeg boundary.
pub struct MockMediaRunner {
    pub aspect_ratio: Option<String>,
    pub fail_probe: bool,
    pub fail_remux: bool,
}

impl MockMediaRunner {
    pub fn with_aspect_ratio(ratio: &str) -> Self {
        Self {
            aspect_ratio: Some(ratio.to_string()),
            fail_probe: false,
            fail_remux: false,
        }
    }

    pub fn without_video_stream() -> Self {
        Self {
            aspect_ratio: None,
            fail_probe: false,
            fail_remux: false,
        }
    }
}

#[async_trait]
impl MediaToolRunner for MockMediaRunner {
    async fn probe(&self, _path: &Path) -> Result<StreamInfo, MediaToolError> {
        if self.fail_probe {
            return Err(MediaToolError::Failed {
                tool: "ffprobe",
                status: "exit status: 1".to_string(),
                diagnostic: "moov atom not found".to_string(),
            });
        }
        Ok(StreamInfo {
            aspect_ratio: self.aspect_ratio.clone(),
            width: self.aspect_ratio.as_ref().map(|_| 1920),
            height: self.aspect_ratio.as_ref().map(|_| 1080),
            codec_name: self.aspect_ratio.as_ref().map(|_| "h264".to_string()),
        })
    }

    async fn remux(&self, path: &Path) -> Result<PathBuf, MediaToolError> {
        if self.fail_remux {
            return Err(MediaToolError::Failed {
                tool: "ffmpeg",
                status: "exit status: 1".to_string(),
                diagnostic: "Invalid data found when processing input".to_string(),
            });
        }
        let output = PathBuf::from(format!("{}.faststart.mp4", path.display()));
        tokio::fs::copy(path, &output).await.map_err(|e| {
            MediaToolError::Failed {
                tool: "ffmpeg",
                status: "exit status: 1".to_string(),
                diagnostic: e.to_string(),
            }
        })?;
        Ok(output)
    }
}

/// A fully wired app over in-memory infrastructure. The temp dirs are held
/// here so they outlive the test body.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub storage: Arc<MockStorageService>,
    pub spool_dir: TempDir,
    pub assets_dir: TempDir,
}

impl TestApp {
    pub fn spool_file_count(&self) -> usize {
        std::fs::read_dir(self.spool_dir.path()).unwrap().count()
    }

    pub fn asset_file_count(&self) -> usize {
        std::fs::read_dir(self.assets_dir.path()).unwrap().count()
    }
}

pub async fn spawn_app(media: Arc<dyn MediaToolRunner>) -> TestApp {
    spawn_app_with_config(media, Config::default()).await
}

pub async fn spawn_app_with_config(
    media: Arc<dyn MediaToolRunner>,
    mut config: Config,
) -> TestApp {
    let spool_dir = TempDir::new().unwrap();
    let assets_dir = TempDir::new().unwrap();

    config.jwt_secret = "test-secret".to_string();
    config.spool_dir = Some(spool_dir.path().to_path_buf());
    config.assets_root = assets_dir.path().to_path_buf();

    let db = setup_test_db().await;
    let storage = Arc::new(MockStorageService::new());
    let uploads = Arc::new(UploadService::new(
        storage.clone(),
        media,
        config.spool_dir.clone(),
    ));

    let state = AppState {
        db,
        storage: storage.clone(),
        uploads,
        config,
    };

    TestApp {
        app: create_app(state.clone()),
        state,
        storage,
        spool_dir,
        assets_dir,
    }
}

pub async fn register_and_login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"email": email, "password": "hunter2hunter2"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"email": email, "password": "hunter2hunter2"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    parsed["token"].as_str().unwrap().to_string()
}

pub async fn create_video(app: &Router, token: &str, title: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/videos")
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::from(json!({"title": title}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    parsed["id"].as_str().unwrap().to_string()
}

pub const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

/// A single-file multipart/form-data body.
pub fn multipart_file(
    field_name: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field_name}\"; \
             filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}

pub async fn response_json(response: axum::http::Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
