//! Shared fixtures: a node over in-memory storage and request builders.
#![allow(dead_code)]

use api_adapters::{router, AppState, SharedState};
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use configs::Settings;
use services::storage::ensure_layout;
use services::{LogIndicator, SystemClock};
use std::sync::Arc;
use storage_adapters::MemoryStorage;
use tower::ServiceExt;

pub const DEVICE_HOST: &str = "192.168.4.1";
pub const BOUNDARY: &str = "----library-test-boundary";

pub struct TestNode {
    pub storage: MemoryStorage,
    pub state: SharedState,
    pub app: Router,
}

pub async fn node() -> TestNode {
    let storage = MemoryStorage::new();
    assert!(ensure_layout(&storage, "/Alexandria").await);
    let state = AppState::new(
        &Settings::default(),
        Arc::new(storage.clone()),
        Arc::new(SystemClock::new()),
        Arc::new(LogIndicator),
        true,
    );
    let app = router(state.clone());
    TestNode { storage, state, app }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

impl TestNode {
    pub async fn send(&self, req: Request<Body>) -> Reply {
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        Reply { status, headers, body }
    }

    pub async fn get(&self, uri: &str) -> Reply {
        self.send(get(uri)).await
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, DEVICE_HOST)
        .body(Body::empty())
        .unwrap()
}

pub fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::HOST, DEVICE_HOST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// One file field, fully terminated.
pub fn multipart_body(file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = multipart_head(file_name);
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Part headers only; append content and, optionally, the closing boundary.
pub fn multipart_head(file_name: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes()
}

pub fn upload(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::HOST, DEVICE_HOST)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}
