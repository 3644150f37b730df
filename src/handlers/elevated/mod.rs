// handlers/elevated/mod.rs - Staff-only handlers
//
// Route prefix: /api/admin/*
// Same JWT middleware as protected routes; the services refuse non-staff callers.
pub mod members;
pub mod sweep;
pub mod users;
