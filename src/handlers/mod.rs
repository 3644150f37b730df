// handlers/mod.rs - 3-tier handler layout
//
// Public (no auth) → Protected (JWT auth) → Elevated (JWT auth + staff)
//
// Handlers only extract input and shape output. Every permission decision is
// made by the service they call.
pub mod public;
pub mod protected;
pub mod elevated;

use serde::Deserialize;
use uuid::Uuid;

/// Body of every swap endpoint
#[derive(Debug, Deserialize)]
pub struct SwapRequest {
    pub first: Uuid,
    pub second: Uuid,
}
