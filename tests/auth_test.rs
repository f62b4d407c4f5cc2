mod common;

use axum::http::StatusCode;
use common::*;
use pdf_vault::config::AppConfig;
use pdf_vault::utils::auth::create_jwt;
use serde_json::json;

#[tokio::test]
async fn test_register_validation_and_conflict() {
    let test = spawn_app(AppConfig::development()).await;

    let response = post_json(
        &test.app,
        "/api/auth/register",
        json!({ "username": "carol", "password": "password123" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(response).await["message"],
        "User registered successfully"
    );

    let response = post_json(
        &test.app,
        "/api/auth/register",
        json!({ "username": "carol", "password": "another-password" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["message"], "Username already exists");

    let response = post_json(
        &test.app,
        "/api/auth/register",
        json!({ "username": "dave", "password": "short" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        &test.app,
        "/api/auth/register",
        json!({ "username": "ed", "password": "password123" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let test = spawn_app(AppConfig::development()).await;
    register_and_login(&test.app, "carol").await;

    let response = post_json(
        &test.app,
        "/api/auth/login",
        json!({ "username": "carol", "password": "wrong-password" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid credentials");

    let response = post_json(
        &test.app,
        "/api/auth/login",
        json!({ "username": "nobody", "password": "password123" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_pdf_routes_require_token() {
    let test = spawn_app(AppConfig::development()).await;

    let response = get(&test.app, "/api/pdf/download/report.pdf", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["message"],
        "No token, authorization denied"
    );

    let response = get(&test.app, "/api/pdf/files", Some("not-a-jwt")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Token is not valid");

    let response = upload_pdf(&test.app, "not-a-jwt", "a.pdf", &pdf_bytes(10)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_edge_cases() {
    let config = AppConfig::development();
    let test = spawn_app(config.clone()).await;

    // Signed with another secret
    let forged = create_jwt("someone", "other-secret", 1).unwrap();
    let response = get(&test.app, "/api/pdf/files", Some(&forged)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Expired
    let expired = create_jwt("someone", &config.jwt_secret, -2).unwrap();
    let response = get(&test.app, "/api/pdf/files", Some(&expired)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid signature but the user does not exist
    let orphan = create_jwt("ghost-user", &config.jwt_secret, 1).unwrap();
    let response = get(&test.app, "/api/pdf/files", Some(&orphan)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Token is not valid");
}

#[tokio::test]
async fn test_token_in_query_string() {
    let test = spawn_app(AppConfig::development()).await;
    let token = register_and_login(&test.app, "carol").await;
    let data = pdf_bytes(128);

    let response = upload_pdf(&test.app, &token, "linked.pdf", &data).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = get(
        &test.app,
        &format!("/api/pdf/download/linked.pdf?token={}", token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn test_malformed_auth_bodies_get_json_errors() {
    let test = spawn_app(AppConfig::development()).await;

    for uri in ["/api/auth/register", "/api/auth/login"] {
        for body in [
            r#"{"username": 5"#,
            r#"{"username": 5, "password": "password123"}"#,
            r#"{"username": "carol"}"#,
            "",
        ] {
            let response = post_raw_json(&test.app, uri, body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {:?}", uri, body);
            assert_eq!(
                response.headers()["content-type"],
                "application/json",
                "{} {:?}",
                uri,
                body
            );
            let message = body_json(response).await;
            assert!(message["message"].is_string(), "{} {:?}", uri, body);
        }
    }

    // Nothing was registered by the rejected bodies
    let response = post_json(
        &test.app,
        "/api/auth/register",
        json!({ "username": "carol", "password": "password123" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}
