#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use http_body_util::BodyExt;
use pdf_vault::config::AppConfig;
use pdf_vault::infrastructure::database;
use pdf_vault::services::storage::{ChunkedBucket, ObjectStore};
use pdf_vault::{AppState, create_app};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "----pdfvaultboundary7MA4YWxkTrZu0gW";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

pub async fn setup_db(config: &AppConfig) -> sea_orm::DatabaseConnection {
    database::setup_database(config).await.unwrap()
}

/// Router backed by an in-memory database bucket.
pub async fn spawn_app(config: AppConfig) -> TestApp {
    let db = setup_db(&config).await;
    let store: Arc<dyn ObjectStore> = Arc::new(ChunkedBucket::new(db.clone(), config.chunk_size));
    spawn_app_with_store(db, store, config)
}

pub fn spawn_app_with_store(
    db: sea_orm::DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    config: AppConfig,
) -> TestApp {
    let state = AppState::new(db, store, config);
    TestApp {
        app: create_app(state.clone()),
        state,
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn post_json(app: &Router, uri: &str, payload: Value) -> Response<Body> {
    post_raw_json(app, uri, payload.to_string()).await
}

/// Posts `body` as-is with a JSON content type, for bodies `Value` can't express.
pub async fn post_raw_json(app: &Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.into()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Registers `username` and returns a fresh token for it.
pub async fn register_and_login(app: &Router, username: &str) -> String {
    let credentials = json!({ "username": username, "password": "password123" });

    let response = post_json(app, "/api/auth/register", credentials.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json(app, "/api/auth/login", credentials).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// One multipart part: field name, optional filename, optional content type, bytes.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn pdf(filename: &'a str, data: &'a [u8]) -> Self {
        Self {
            name: "file",
            filename: Some(filename),
            content_type: Some("application/pdf"),
            data,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn upload_parts(app: &Router, token: &str, parts: &[Part<'_>]) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/pdf/upload")
                .header("Authorization", format!("Bearer {}", token))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn upload_pdf(app: &Router, token: &str, filename: &str, data: &[u8]) -> Response<Body> {
    upload_parts(app, token, &[Part::pdf(filename, data)]).await
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Deterministic payload that starts like a PDF.
pub fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut data = b"%PDF-1.7\n".to_vec();
    data.extend((0..len).map(|i| (i % 251) as u8));
    data.truncate(len);
    data
}
