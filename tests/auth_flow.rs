use axum::{body::Body, http::Request, http::StatusCode};
use serde_json::json;
use tower::util::ServiceExt; // for oneshot

mod common;
use common::{authed, body_json, json_request, refresh_cookie, sign_in, spawn_app};

fn refresh_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/auth/refresh");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_send_otp_emails_a_code() {
    let app = spawn_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/send-otp",
            json!({ "email": "Asha@Example.com ", "name": "Asha" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "OTP sent to email successfully");

    let sent = app.email_sender.sent_emails.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "asha@example.com");
    assert_eq!(sent[0].1, "Verify Your Email");
    assert!(sent[0].2.contains("Hello Asha"));
}

#[tokio::test]
async fn test_send_otp_validation_errors() {
    let app = spawn_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/send-otp",
            json!({ "email": "nope", "name": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["errors"]["name"], "name: Username is required");
    assert_eq!(body["errors"]["email"], "email: Valid email required");
    assert!(app.email_sender.sent_emails.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_then_profile() {
    let app = spawn_app();
    let session = sign_in(&app, "kai@example.com", "Kai").await;

    assert_eq!(session.user["email"], "kai@example.com");
    assert_eq!(session.user["preferences"]["theme"], "dark");

    let response = app
        .router
        .clone()
        .oneshot(authed("GET", "/api/users/me", &session.access_token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "Kai");
}

#[tokio::test]
async fn test_wrong_otp_counts_down_then_locks() {
    let app = spawn_app();
    let email = "lock@example.com";
    app.router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/send-otp",
            json!({ "email": email, "name": "Lock" }),
        ))
        .await
        .unwrap();

    let real = app.email_sender.last_otp(email).unwrap();
    let wrong = if real.eq_ignore_ascii_case("zzzzzz") { "yyyyyy" } else { "zzzzzz" };
    let attempt = |otp: &str| {
        json_request(
            "POST",
            "/api/auth/verify-otp",
            json!({ "email": email, "name": "Lock", "otp": otp }),
        )
    };

    let response = app.router.clone().oneshot(attempt(wrong)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_OTP");
    assert_eq!(body["message"], "Invalid OTP. 2 attempts remaining");

    app.router.clone().oneshot(attempt(wrong)).await.unwrap();
    let response = app.router.clone().oneshot(attempt(wrong)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["message"], "Too many failed attempts");

    // The record is gone, so even the right code no longer works.
    let response = app.router.clone().oneshot(attempt(&real)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["message"], "OTP not found or expired");
}

#[tokio::test]
async fn test_refresh_rotates_and_old_cookie_dies() {
    let app = spawn_app();
    let session = sign_in(&app, "rot@example.com", "Rot").await;

    let response = app
        .router
        .clone()
        .oneshot(refresh_request(Some(&session.cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = refresh_cookie(&response).expect("rotated cookie");
    assert_ne!(rotated, session.cookie);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Token refreshed successfully");
    let access = body["data"]["accessToken"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(authed("GET", "/api/users/me", &access, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(refresh_request(Some(&session.cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_REFRESH_TOKEN");

    let response = app
        .router
        .clone()
        .oneshot(refresh_request(Some(&rotated)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let app = spawn_app();
    let response = app.router.clone().oneshot(refresh_request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "NO_REFRESH_TOKEN");
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = spawn_app();
    let session = sign_in(&app, "bye@example.com", "Bye").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("cookie", &session.cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with("refreshToken=;") || v.starts_with("refreshToken=\"\""));
    assert!(cleared);
    assert_eq!(body_json(response).await["message"], "Logout successful");

    let response = app
        .router
        .clone()
        .oneshot(refresh_request(Some(&session.cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_errors() {
    let app = spawn_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/users/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "NO_TOKEN");

    let response = app
        .router
        .clone()
        .oneshot(authed("GET", "/api/users/me", "garbage", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = spawn_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "ROUTE_NOT_FOUND");
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Server is running...");
    assert_eq!(body["cache"], "memory cache connected");
}

#[tokio::test]
async fn test_longer_codes_verify() {
    let app = common::spawn_app_with(climecast::AppConfig {
        otp_length: 8,
        ..climecast::AppConfig::default()
    });

    let session = sign_in(&app, "long@example.com", "Long").await;
    assert!(!session.access_token.is_empty());
}

#[tokio::test]
async fn test_send_otp_refuses_addresses_the_mailer_cannot_use() {
    let app = spawn_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/send-otp",
            json!({ "email": "a..b@example.com", "name": "Asha" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["errors"]["email"], "email: Valid email required");
    assert!(app.email_sender.sent_emails.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_valid_token_under_another_scheme_is_refused() {
    let app = spawn_app();
    let session = sign_in(&app, "scheme@example.com", "Sam").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/users/me")
                .header("authorization", format!("Basic {}", session.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "NO_TOKEN");
}
