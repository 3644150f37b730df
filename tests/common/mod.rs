#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use learnhub_api::auth::{generate_jwt, Claims};
use learnhub_api::config::AppConfig;
use learnhub_api::database::MemoryStore;
use learnhub_api::jobs::{JobHandler, ManualJobQueue};
use learnhub_api::routes::app;
use learnhub_api::services::{AppState, UserService};

/// The router over an in-memory store, with jobs held until `run_jobs`
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<ManualJobQueue>,
}

/// A registered user and the bearer token to act as them
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(ManualJobQueue::new());
        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;
        let state = AppState::new(store.clone(), queue.clone(), config);
        Self {
            router: app(state.clone()),
            state,
            store,
            queue,
        }
    }

    /// Send a request and decode the JSON body (Null for empty bodies)
    pub async fn send(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {:?}", bytes))?
        };
        Ok((status, value))
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, path, Some(token), Some(body)).await
    }

    /// Register over HTTP and return the issued token
    pub async fn register(&self, username: &str, role: &str) -> Result<TestUser> {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(serde_json::json!({ "username": username, "role": role })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {} {}", status, body);

        let id = body["data"]["user"]["id"].as_str().context("missing user id")?.parse()?;
        let token = body["data"]["token"].as_str().context("missing token")?.to_string();
        Ok(TestUser { id, token })
    }

    /// Staff cannot self-register; create one directly and sign a token
    pub async fn staff(&self, username: &str) -> Result<TestUser> {
        let user = UserService::new(self.store.clone()).create_staff(username).await?;
        let security = &self.state.config.security;
        let token = generate_jwt(&Claims::for_user(&user, security), &security.jwt_secret)?;
        Ok(TestUser { id: user.id, token })
    }

    /// A teacher approved by a fresh staff account
    pub async fn approved_teacher(&self, username: &str) -> Result<TestUser> {
        let teacher = self.register(username, "teacher").await?;
        let staff = self.staff(&format!("mod_{}", username.chars().take(10).collect::<String>())).await?;
        let (status, body) = self
            .send(
                Method::PUT,
                &format!("/api/admin/users/{}/status", teacher.id),
                Some(&staff.token),
                Some(serde_json::json!({ "status": "approved" })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "moderation failed: {} {}", status, body);
        Ok(teacher)
    }

    /// Deliver every queued job, as the worker pool would
    pub async fn run_jobs(&self) {
        let handler = JobHandler::new(self.store.clone(), self.queue.clone());
        self.queue.run_pending(&handler).await;
    }
}
