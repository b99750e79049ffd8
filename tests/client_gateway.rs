//! The client gateway and auth calls against a live server.

use climecast::client::{
    ApiRequest, AuthApi, CredentialStore, FailureKind, Gateway, HttpTransport,
    MemoryCredentialStore, Outcome,
};
use std::net::SocketAddr;
use std::sync::Arc;

mod common;
use common::{spawn_app, TestApp};

async fn serve(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://{}/api", addr)
}

async fn signed_in_client(app: &TestApp, email: &str) -> (AuthApi, Arc<MemoryCredentialStore>) {
    let base = serve(app).await;
    let credentials = Arc::new(MemoryCredentialStore::new());
    let transport = Arc::new(HttpTransport::new(base).unwrap());
    let api = AuthApi::new(Gateway::new(transport, credentials.clone()));

    api.send_otp(email, "Gale").await.unwrap();
    let otp = app.email_sender.last_otp(email).unwrap();
    api.verify_otp(email, &otp, "Gale").await.unwrap();
    (api, credentials)
}

#[tokio::test]
async fn test_sign_in_and_check_auth() {
    let app = spawn_app();
    let (api, credentials) = signed_in_client(&app, "gale@example.com").await;

    assert!(credentials.get().is_some());
    let user = api.check_auth().await.unwrap().unwrap();
    assert_eq!(user["email"], "gale@example.com");

    api.logout().await;
    assert_eq!(credentials.get(), None);
    assert_eq!(api.check_auth().await.unwrap(), None);
}

#[tokio::test]
async fn test_rejected_token_is_renewed_once_for_concurrent_calls() {
    let app = spawn_app();
    let (api, credentials) = signed_in_client(&app, "burst@example.com").await;
    credentials.set("not-a-real-token".to_string());

    let calls = (0..4).map(|_| {
        let gateway = api.gateway().clone();
        tokio::spawn(async move { gateway.execute(&ApiRequest::get("/users/me")).await })
    });
    let handles: Vec<_> = calls.collect();

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.is_success(), "{:?}", outcome);
    }
    let renewed = credentials.get().unwrap();
    assert_ne!(renewed, "not-a-real-token");

    // The rotated renewal cookie is still good for the next round.
    credentials.set("stale-again".to_string());
    let outcome = api.gateway().execute(&ApiRequest::get("/locations")).await;
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_revoked_session_requires_sign_in() {
    let app = spawn_app();
    let (api, credentials) = signed_in_client(&app, "gone@example.com").await;

    // Revoke the renewal token server-side but keep a dead access token.
    let gateway = api.gateway().clone();
    gateway
        .execute(&ApiRequest::post("/auth/logout", serde_json::json!({})))
        .await;
    credentials.set("expired".to_string());

    match gateway.execute(&ApiRequest::get("/users/me")).await {
        Outcome::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::ReauthenticationRequired);
            assert_eq!(failure.status, Some(401));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(credentials.get(), None);
}
