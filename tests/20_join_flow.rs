mod common;

use anyhow::{Context, Result};
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{TestApp, TestUser};

async fn create_course(app: &TestApp, owner: &TestUser, accessibility: &str) -> Result<Value> {
    let (status, body) = app
        .post(
            "/api/courses",
            &owner.token,
            json!({ "title": "Algebra", "short_description": "Groups and rings", "accessibility": accessibility }),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create failed: {} {}", status, body);
    Ok(body["data"].clone())
}

#[tokio::test]
async fn moderated_course_join_is_applied_by_the_worker() -> Result<()> {
    let app = TestApp::new();
    let teacher = app.approved_teacher("tina").await?;
    let student = app.register("stan", "student").await?;
    let course = create_course(&app, &teacher, "on_requests").await?;
    let course_id = course["id"].as_str().context("course id")?;

    // Outsiders cannot see a moderated course
    let (status, _) = app.get(&format!("/api/courses/{}", course_id), &student.token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&format!("/api/courses/{}/join", course_id), &student.token, json!({}))
        .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["outcome"], "pending");

    let (status, body) = app
        .post(&format!("/api/courses/{}/join", course_id), &student.token, json!({}))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_REQUEST");

    let (status, body) = app
        .get(&format!("/api/courses/{}/requests?status=on_mod", course_id), &teacher.token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["data"][0]["id"].as_str().context("request id")?.to_string();

    let (status, body) = app
        .post(
            &format!("/api/courses/{}/requests/{}", course_id, request_id),
            &teacher.token,
            json!({ "status": "approved" }),
        )
        .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "approved");

    // Nothing changes until the decision job runs
    let (_, body) = app.get(&format!("/api/courses/{}/role", course_id), &student.token).await?;
    assert!(body["data"]["role"].is_null());

    app.run_jobs().await;

    let (status, body) = app.get(&format!("/api/courses/{}", course_id), &student.token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["my_role"], "student");
    assert!(body["data"]["course_code"].is_null());

    let (_, body) = app.get(&format!("/api/courses/{}/members", course_id), &student.token).await?;
    let names: Vec<&str> = body["data"]
        .as_array()
        .context("members")?
        .iter()
        .filter_map(|m| m["username"].as_str())
        .collect();
    assert_eq!(names, vec!["tina", "stan"]);
    Ok(())
}

#[tokio::test]
async fn rejected_requests_stay_rejected() -> Result<()> {
    let app = TestApp::new();
    let teacher = app.approved_teacher("tina").await?;
    let student = app.register("rob", "student").await?;
    let course = create_course(&app, &teacher, "on_requests").await?;
    let course_id = course["id"].as_str().context("course id")?;

    app.post(&format!("/api/courses/{}/join", course_id), &student.token, json!({}))
        .await?;
    let (_, body) = app.get(&format!("/api/courses/{}/requests", course_id), &teacher.token).await?;
    let request_id = body["data"][0]["id"].as_str().context("request id")?.to_string();

    // Students cannot moderate
    let (status, _) = app
        .post(
            &format!("/api/courses/{}/requests/{}", course_id, request_id),
            &student.token,
            json!({ "status": "approved" }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            &format!("/api/courses/{}/requests/{}", course_id, request_id),
            &teacher.token,
            json!({ "status": "rejected" }),
        )
        .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    app.run_jobs().await;

    let (status, body) = app
        .post(&format!("/api/courses/{}/join", course_id), &student.token, json!({}))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "REQUEST_REJECTED");
    Ok(())
}

#[tokio::test]
async fn public_courses_and_join_codes_admit_immediately() -> Result<()> {
    let app = TestApp::new();
    let teacher = app.approved_teacher("tina").await?;
    let first = app.register("ann", "student").await?;
    let second = app.register("ben", "student").await?;

    let public = create_course(&app, &teacher, "public").await?;
    let public_id = public["id"].as_str().context("course id")?;
    let (status, body) = app
        .post(&format!("/api/courses/{}/join", public_id), &first.token, json!({}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "joined");

    let invite = create_course(&app, &teacher, "on_invite_only").await?;
    let code = invite["course_code"].as_str().context("course code")?;
    let (status, body) = app.post("/api/join", &second.token, json!({ "code": code })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["course_id"], invite["id"]);

    let (status, body) = app.post("/api/join", &second.token, json!({ "code": code })).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_MEMBER");

    let (status, _) = app.post("/api/join", &second.token, json!({ "code": "nope00" })).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn leaving_and_kicking_end_membership() -> Result<()> {
    let app = TestApp::new();
    let teacher = app.approved_teacher("tina").await?;
    let student = app.register("stan", "student").await?;
    let course = create_course(&app, &teacher, "public").await?;
    let course_id = course["id"].as_str().context("course id")?;

    app.post(&format!("/api/courses/{}/join", course_id), &student.token, json!({}))
        .await?;

    let (status, body) = app
        .post(&format!("/api/courses/{}/leave", course_id), &teacher.token, json!({}))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "OWNER_CANNOT_LEAVE");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/courses/{}/members/{}", course_id, student.id),
            Some(&teacher.token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get(&format!("/api/courses/{}/role", course_id), &student.token).await?;
    assert!(body["data"]["role"].is_null());

    let (status, _) = app
        .post(&format!("/api/courses/{}/leave", course_id), &student.token, json!({}))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn lecturers_promote_members() -> Result<()> {
    let app = TestApp::new();
    let teacher = app.approved_teacher("tina").await?;
    let student = app.register("stan", "student").await?;
    let course = create_course(&app, &teacher, "public").await?;
    let course_id = course["id"].as_str().context("course id")?;
    app.post(&format!("/api/courses/{}/join", course_id), &student.token, json!({}))
        .await?;

    let role_path = format!("/api/courses/{}/members/{}/role", course_id, student.id);
    let (status, _) = app
        .send(Method::PUT, &role_path, Some(&teacher.token), Some(json!({ "role": "lecturer" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::PUT, &role_path, Some(&teacher.token), Some(json!({ "role": "co_lecturer" })))
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Co-lecturers see the join code
    let (_, body) = app.get(&format!("/api/courses/{}", course_id), &student.token).await?;
    assert_eq!(body["data"]["my_role"], "co_lecturer");
    assert_eq!(body["data"]["course_code"], course["course_code"]);
    Ok(())
}
