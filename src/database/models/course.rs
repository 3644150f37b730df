use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{Accessibility, CourseRole, JoinStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub short_description: String,
    pub course_code: String,
    #[sqlx(try_from = "String")]
    pub accessibility: Accessibility,
    pub created_at: DateTime<Utc>,
}

/// Row of `course_roles`: the authoritative per-course role of a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseRoleRow {
    pub user_id: Uuid,
    pub course_id: Uuid,
    #[sqlx(try_from = "String")]
    pub role: CourseRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseJoinRequest {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: JoinStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseJoinRequest {
    pub fn new(course_id: Uuid, user_id: Uuid, status: JoinStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            course_id,
            user_id,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseSection {
    pub id: Uuid,
    pub course_id: Uuid,
    pub section_name: String,
    pub order: i32,
}
