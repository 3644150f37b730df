mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn register_then_whoami() -> Result<()> {
    let app = TestApp::new();
    let alice = app.register("alice", "student").await?;

    let (status, body) = app.get("/api/auth/whoami", &alice.token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["role"], "student");
    assert_eq!(body["data"]["status"], "approved");
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/auth/whoami", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/auth/whoami", "not-a-jwt").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn registration_is_validated() -> Result<()> {
    let app = TestApp::new();
    app.register("taken", "student").await?;

    let (status, body) = app
        .send(Method::POST, "/auth/register", None, Some(json!({ "username": "taken" })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "USERNAME_TAKEN");

    let (status, body) = app
        .send(Method::POST, "/auth/register", None, Some(json!({ "username": "way_too_long_name" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["username"].is_string());

    let (status, _) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "boss", "role": "staff" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn teachers_author_only_after_moderation() -> Result<()> {
    let app = TestApp::new();
    let teacher = app.register("tina", "teacher").await?;
    let course = json!({ "title": "Rust 101", "accessibility": "public" });

    let (status, _) = app.post("/api/courses", &teacher.token, course.clone()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staff = app.staff("boss").await?;
    let (status, body) = app.get("/api/admin/users?role=teacher&status=on_moderation", &staff.token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/admin/users/{}/status", teacher.id),
            Some(&staff.token),
            Some(json!({ "status": "approved" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    // The middleware reloads the user, so the old token now carries the new status
    let (status, body) = app.post("/api/courses", &teacher.token, course).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["title"], "Rust 101");
    Ok(())
}

#[tokio::test]
async fn admin_routes_reject_non_staff() -> Result<()> {
    let app = TestApp::new();
    let student = app.register("stan", "student").await?;

    let (status, body) = app.get("/api/admin/users", &student.token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app.post("/api/admin/sweep", &student.token, json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
