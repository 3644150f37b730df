// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Route prefix: /api/*
// Middleware: jwt_auth_middleware injects a fresh `Principal` extension
pub mod auth;
pub mod content;
pub mod courses;
pub mod membership;
pub mod quiz;
pub mod sessions;
