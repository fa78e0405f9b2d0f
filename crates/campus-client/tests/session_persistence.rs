//! Session persistence across client restarts.

use std::sync::Arc;

use campus_client::{CampusClient, FileStorage, SessionStore};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file_store(dir: &TempDir) -> Arc<SessionStore> {
    let store = SessionStore::new(Arc::new(FileStorage::in_dir(dir.path())));
    store.init().unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_renewed_token_survives_restart() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "at-1",
            "refreshToken": "rt-1",
            "user": {"id": "u1", "email": "admin@school.test"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "at-2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .and(header("authorization", "Bearer at-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c1", "name": "Mathematics", "coefficient": 4}],
            "meta": {"total": 1, "page": 1, "limit": 20, "totalPages": 1}
        })))
        .expect(2)
        .mount(&server)
        .await;

    {
        let client = CampusClient::builder()
            .base_url(server.uri())
            .session(file_store(&dir))
            .build()
            .unwrap();
        client.auth().login("admin@school.test", "secret").await.unwrap();
        client.courses().list().await.unwrap();
    }

    // A fresh process picks up the renewed token without renewing again.
    let session = file_store(&dir);
    assert_eq!(session.access_token().as_deref(), Some("at-2"));
    assert_eq!(session.refresh_token().as_deref(), Some("rt-1"));
    assert_eq!(session.user().unwrap().email, "admin@school.test");

    let client = CampusClient::builder()
        .base_url(server.uri())
        .session(session)
        .build()
        .unwrap();
    let page = client.courses().list().await.unwrap();
    assert_eq!(page.data[0].name, "Mathematics");
}

#[tokio::test]
async fn test_failed_renewal_removes_session_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let session = file_store(&dir);
    session.start("at-1", Some("rt-1"), None).unwrap();
    assert!(dir.path().join("session.json").exists());

    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let client = CampusClient::builder()
        .base_url(server.uri())
        .session(session)
        .build()
        .unwrap();
    let err = client.students().list().await.unwrap_err();

    assert!(err.is_session_expired());
    assert!(!dir.path().join("session.json").exists());
    assert!(!file_store(&dir).is_authenticated());
}
