mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::*;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn register_rejects_invalid_email() {
    let test_app = spawn_app(Arc::new(MockMediaRunner::with_aspect_ratio("16:9"))).await;

    let response = test_app
        .app
        .clone()
        .oneshot(json_post(
            "/register",
            json!({"email": "not-an-email", "password": "hunter2hunter2"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let test_app = spawn_app(Arc::new(MockMediaRunner::with_aspect_ratio("16:9"))).await;
    register_and_login(&test_app.app, "owner@example.com").await;

    let response = test_app
        .app
        .clone()
        .oneshot(json_post(
            "/register",
            json!({"email": "owner@example.com", "password": "hunter2hunter2"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let test_app = spawn_app(Arc::new(MockMediaRunner::with_aspect_ratio("16:9"))).await;
    register_and_login(&test_app.app, "owner@example.com").await;

    let response = test_app
        .app
        .clone()
        .oneshot(json_post(
            "/login",
            json!({"email": "owner@example.com", "password": "wrong-password"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let test_app = spawn_app(Arc::new(MockMediaRunner::with_aspect_ratio("16:9"))).await;

    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/videos")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/videos")
                .header("Authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_issues_a_new_access_token() {
    let test_app = spawn_app(Arc::new(MockMediaRunner::with_aspect_ratio("16:9"))).await;

    test_app
        .app
        .clone()
        .oneshot(json_post(
            "/register",
            json!({"email": "owner@example.com", "password": "hunter2hunter2"}),
        ))
        .await
        .unwrap();

    let response = test_app
        .app
        .clone()
        .oneshot(json_post(
            "/login",
            json!({"email": "owner@example.com", "password": "hunter2hunter2"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = response_json(response).await;
    let refresh_token = parsed["refresh_token"].as_str().unwrap().to_string();

    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/refresh")
                .header("Authorization", format!("Bearer {refresh_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = response_json(response).await;
    let token = parsed["token"].as_str().unwrap();

    // The refreshed token works against a protected route
    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/videos")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn revoked_refresh_tokens_are_rejected() {
    let test_app = spawn_app(Arc::new(MockMediaRunner::with_aspect_ratio("16:9"))).await;

    test_app
        .app
        .clone()
        .oneshot(json_post(
            "/register",
            json!({"email": "owner@example.com", "password": "hunter2hunter2"}),
        ))
        .await
        .unwrap();

    let response = test_app
        .app
        .clone()
        .oneshot(json_post(
            "/login",
            json!({"email": "owner@example.com", "password": "hunter2hunter2"}),
        ))
        .await
        .unwrap();
    let parsed = response_json(response).await;
    let refresh_token = parsed["refresh_token"].as_str().unwrap().to_string();

    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/revoke")
                .header("Authorization", format!("Bearer {refresh_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/refresh")
                .header("Authorization", format!("Bearer {refresh_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
