//! Shared helpers for router tests.

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::db::MemoryStore;
use crate::routes::AppState;

pub const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// Router over a fresh in-memory store with uploads in a temp dir.
/// Keep the `TempDir` alive for the duration of the test.
pub fn test_app() -> (Router, AppState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        jwt_secret: "test-secret".to_string(),
        bcrypt_cost: 4,
        upload_dir: dir.path().to_path_buf(),
        ..AppConfig::default()
    };
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    (crate::create_app(state.clone()), state, dir)
}

pub async fn read_json<T: DeserializeOwned>(res: Response) -> T {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn send_json<B: Serialize>(app: &Router, method: Method, uri: &str, body: &B) -> Response {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    app.clone().oneshot(req).await.unwrap()
}

pub enum MultipartPart<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

impl<'a> MultipartPart<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        MultipartPart::Text(name, value)
    }

    pub fn file(name: &'a str, file_name: &'a str, bytes: &'a [u8]) -> Self {
        MultipartPart::File(name, file_name, bytes)
    }
}

/// Encode a `multipart/form-data` body; returns (content type, body).
pub fn multipart_body(parts: &[MultipartPart<'_>]) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "bloodlink-test-boundary";
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            MultipartPart::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            MultipartPart::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}
