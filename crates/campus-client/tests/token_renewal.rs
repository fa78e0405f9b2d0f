//! End-to-end tests of the token renewal protocol against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use campus_client::{CampusClient, ClientEvent, Error, SessionStore};
use serde_json::{Value, json};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    client: CampusClient,
    events: UnboundedReceiver<ClientEvent>,
}

impl Harness {
    async fn new(access_token: Option<&str>, refresh_token: Option<&str>) -> Self {
        Self::with_timeout(access_token, refresh_token, Duration::from_secs(5)).await
    }

    async fn with_timeout(
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        timeout: Duration,
    ) -> Self {
        let server = MockServer::start().await;

        let session = SessionStore::in_memory();
        if let Some(access_token) = access_token {
            session.start(access_token, refresh_token, None).unwrap();
        }

        let (tx, events) = unbounded_channel();
        let client = CampusClient::builder()
            .base_url(server.uri())
            .timeout(timeout)
            .session(Arc::new(session))
            .event_sink(Arc::new(tx))
            .build()
            .unwrap();

        Self {
            server,
            client,
            events,
        }
    }

    fn drain_events(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

fn students_page() -> Value {
    json!({
        "data": [
            {"id": "s1", "firstName": "Lina", "lastName": "Benali"},
            {"id": "s2", "firstName": "Omar", "lastName": "Rahmani"}
        ],
        "meta": {"total": 2, "page": 1, "limit": 20, "totalPages": 1}
    })
}

fn unauthorized() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({"statusCode": 401, "message": "Unauthorized"}))
}

// ─────────────────────────────────────────────────────────────────────────────
// Success paths
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_success_without_renewal_is_transparent() {
    let mut h = Harness::new(Some("valid-at"), Some("rt-123")).await;

    Mock::given(method("GET"))
        .and(path("/students"))
        .and(header("authorization", "Bearer valid-at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(students_page()))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let before = h.client.session().snapshot();
    let page = h.client.students().list().await.unwrap();

    assert_eq!(page.data.len(), 2);
    assert_eq!(h.client.session().snapshot(), before);
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn test_expired_token_is_renewed_and_call_replayed() {
    let mut h = Harness::new(Some("expired"), Some("rt-123")).await;

    Mock::given(method("GET"))
        .and(path("/students"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "rt-123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "new-at"})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/students"))
        .and(header("authorization", "Bearer new-at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(students_page()))
        .expect(1)
        .mount(&h.server)
        .await;

    let page = h.client.students().list().await.unwrap();

    assert_eq!(page.data[0].first_name, "Lina");
    let session = h.client.session().snapshot();
    assert_eq!(session.access_token.as_deref(), Some("new-at"));
    assert_eq!(session.refresh_token.as_deref(), Some("rt-123"));
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn test_replay_keeps_method_and_body() {
    let h = Harness::new(Some("expired"), Some("rt-123")).await;
    let body = json!({"name": "CM2-B", "capacity": 28});

    Mock::given(method("POST"))
        .and(path("/classrooms"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "new-at"})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/classrooms"))
        .and(header("authorization", "Bearer new-at"))
        .and(body_json(body.clone()))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": "c9", "name": "CM2-B", "capacity": 28})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let classroom = h.client.classrooms().create(&body).await.unwrap();
    assert_eq!(classroom.id, "c9");
    assert_eq!(classroom.capacity, Some(28));
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure paths
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_refresh_token_fails_without_network_call() {
    let mut h = Harness::new(Some("expired"), None).await;

    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "x"})))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.client.students().list().await.unwrap_err();

    assert!(err.is_session_expired(), "unexpected error: {err:?}");
    assert!(h.client.session().snapshot().is_empty());
    assert_eq!(h.drain_events(), vec![ClientEvent::SessionExpired]);
}

#[tokio::test]
async fn test_rejected_refresh_clears_session_and_expires() {
    let mut h = Harness::new(Some("expired"), Some("rt-revoked")).await;
    h.client
        .session()
        .start(
            "expired",
            Some("rt-revoked"),
            Some(&campus_client::UserSummary {
                id: "u1".into(),
                email: "admin@school.test".into(),
                first_name: None,
                last_name: None,
                role: Some("admin".into()),
                school_id: Some("school-1".into()),
            }),
        )
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/teachers"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid refresh token"})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.teachers().list().await.unwrap_err();

    // The renewal error is surfaced, not the original 401.
    match err {
        Error::Renewal { status, message } => {
            assert_eq!(status, Some(401));
            assert_eq!(message, "Invalid refresh token");
        }
        other => panic!("expected renewal error, got {other:?}"),
    }
    let session = h.client.session().snapshot();
    assert_eq!(session.access_token, None);
    assert_eq!(session.refresh_token, None);
    assert_eq!(session.user, None);
    assert_eq!(h.drain_events(), vec![ClientEvent::SessionExpired]);
}

#[tokio::test]
async fn test_refresh_transport_failure_is_renewal_failure() {
    let mut h = Harness::with_timeout(Some("expired"), Some("rt-123"), Duration::from_millis(300)).await;

    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(unauthorized())
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "too-late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&h.server)
        .await;

    let err = h.client.students().list().await.unwrap_err();

    match err {
        Error::Renewal { status, .. } => assert_eq!(status, None),
        other => panic!("expected renewal error, got {other:?}"),
    }
    assert!(h.client.session().snapshot().is_empty());
    assert_eq!(h.drain_events(), vec![ClientEvent::SessionExpired]);
}

#[tokio::test]
async fn test_second_rejection_is_returned_as_is() {
    let mut h = Harness::new(Some("expired"), Some("rt-123")).await;

    // The endpoint rejects every token, renewed or not.
    Mock::given(method("GET"))
        .and(path("/payments"))
        .respond_with(unauthorized())
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "new-at"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.payments().list().await.unwrap_err();

    assert!(err.is_auth_error(), "unexpected error: {err:?}");
    // Renewal itself succeeded, so the session survives.
    assert_eq!(h.client.session().access_token().as_deref(), Some("new-at"));
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn test_domain_failure_bypasses_recovery_and_notifies_once() {
    let mut h = Harness::new(Some("valid-at"), Some("rt-123")).await;

    Mock::given(method("POST"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "statusCode": 422,
            "message": ["firstName should not be empty"],
            "error": "Unprocessable Entity"
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h
        .client
        .students()
        .create(&json!({"lastName": "Benali"}))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(
        h.drain_events(),
        vec![ClientEvent::RequestFailed {
            status: Some(422),
            message: "firstName should not be empty".to_string(),
        }]
    );
    assert_eq!(h.client.session().access_token().as_deref(), Some("valid-at"));
}

#[tokio::test]
async fn test_not_found_notifies_with_fallback_message() {
    let mut h = Harness::new(Some("valid-at"), Some("rt-123")).await;

    Mock::given(method("GET"))
        .and(path("/exams/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.exams().get("missing").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(
        h.drain_events(),
        vec![ClientEvent::RequestFailed {
            status: Some(404),
            message: campus_client::error::GENERIC_ERROR_MESSAGE.to_string(),
        }]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rejections_share_one_renewal() {
    let mut h = Harness::new(Some("expired"), Some("rt-123")).await;

    Mock::given(method("GET"))
        .and(path("/absences"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(unauthorized())
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "rt-123"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "new-at"}))
                .set_delay(Duration::from_millis(200)),
        )
        // Rotation: the refresh token is only good once.
        .up_to_n_times(1)
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "refresh token reused"})))
        .expect(0)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/absences"))
        .and(header("authorization", "Bearer new-at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "meta": {"total": 0, "page": 1, "limit": 20, "totalPages": 0}
        })))
        .expect(6)
        .mount(&h.server)
        .await;

    let calls: Vec<_> = (0..6)
        .map(|_| {
            let client = h.client.clone();
            tokio::spawn(async move { client.absences().list().await })
        })
        .collect();

    for call in calls {
        call.await.unwrap().unwrap();
    }
    assert_eq!(h.client.session().access_token().as_deref(), Some("new-at"));
    assert!(h.drain_events().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication API
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_starts_session() {
    let h = Harness::new(None, None).await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "admin@school.test", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "at-1",
            "refreshToken": "rt-1",
            "user": {"id": "u1", "email": "admin@school.test", "role": "admin", "schoolId": "school-1"}
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.auth().login("admin@school.test", "secret").await.unwrap();

    let session = h.client.session().snapshot();
    assert_eq!(session.access_token.as_deref(), Some("at-1"));
    assert_eq!(session.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(session.user.unwrap().school_id.as_deref(), Some("school-1"));
}

#[tokio::test]
async fn test_bad_credentials_do_not_trigger_renewal() {
    let mut h = Harness::new(Some("old-at"), Some("rt-1")).await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.client.auth().login("admin@school.test", "wrong").await.unwrap_err();

    assert!(err.is_auth_error());
    assert_eq!(err.to_string(), "Authentication failed: Invalid credentials");
    assert_eq!(h.client.session().access_token().as_deref(), Some("old-at"));
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn test_logout_clears_session_even_if_backend_fails() {
    let mut h = Harness::new(Some("at-1"), Some("rt-1")).await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.auth().logout().await.unwrap();
    assert!(h.client.session().snapshot().is_empty());
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn test_me_updates_cached_user() {
    let h = Harness::new(Some("at-1"), Some("rt-1")).await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1", "email": "admin@school.test", "firstName": "Amina", "lastName": "Haddad"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h.client.auth().me().await.unwrap();
    assert_eq!(user.display_name(), "Amina Haddad");
    assert_eq!(h.client.session().user(), Some(user));
}
