//! Server wired from a TOML file onto the redb backend

use std::fs;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use cinder_crypto::{CipherEngine, SymmetricKey};
use cinder_server::config::{ServerConfig, StorageBackend};
use cinder_server::{AppState, build_router, open_store};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let db = dir.path().join("pastes.redb");
    let path = dir.path().join("cinder.toml");
    fs::write(
        &path,
        format!(
            r#"
            public_origin = "https://paste.example"

            [storage]
            backend = "redb"
            path = "{}"
            "#,
            db.display()
        ),
    )
    .unwrap();
    path
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_pastes_survive_restart() {
    let dir = TempDir::new().unwrap();
    let config = ServerConfig::load(&write_config(&dir)).unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Redb);

    let key = SymmetricKey::generate();
    let content = CipherEngine::seal("durable", &key).unwrap();

    let id = {
        let router = build_router(&config, AppState::new(&config, open_store(&config).unwrap()));
        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/pastes")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "content": content }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        assert!(body["url"].as_str().unwrap().starts_with("https://paste.example/"));
        body["id"].as_str().unwrap().to_string()
    };

    // The first router and its database handle are gone; reopen the file
    let router = build_router(&config, AppState::new(&config, open_store(&config).unwrap()));
    let resp = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/pastes/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    let plaintext = CipherEngine::open(body["content"].as_str().unwrap(), &key).unwrap();
    assert_eq!(plaintext, "durable");
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "bind = 42").unwrap();
    assert!(ServerConfig::load(&path).is_err());
    assert!(ServerConfig::load(&dir.path().join("missing.toml")).is_err());
}
