// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Route prefix: none (/, /health, /auth/*)
pub mod auth;
pub mod system;
