use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{GlobalRole, ModerationStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[sqlx(try_from = "String")]
    pub role: GlobalRole,
    #[sqlx(try_from = "String")]
    pub status: ModerationStatus,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New account with the registration defaults for `role`:
    /// teachers wait for moderation, staff are superusers.
    pub fn new(username: impl Into<String>, role: GlobalRole) -> Self {
        let status = match role {
            GlobalRole::Teacher => ModerationStatus::OnModeration,
            _ => ModerationStatus::Approved,
        };
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            role,
            status,
            is_superuser: role == GlobalRole::Staff,
            created_at: Utc::now(),
        }
    }
}
