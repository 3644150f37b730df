use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::User;
use crate::database::Store;
use crate::services::error::{ConflictReason, OnUnique, ServiceError, ServiceResult};
use crate::services::permissions;
use crate::types::{GlobalRole, ModerationStatus};

pub const USERNAME_MAX_CHARS: usize = 15;
const FORBIDDEN_USERNAME_CHARS: &str = "!@#$%^&*()";

pub fn validate_username(username: &str) -> ServiceResult<()> {
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX_CHARS {
        return Err(ServiceError::field(
            "username",
            format!("Username must be 1 to {} characters", USERNAME_MAX_CHARS),
        ));
    }
    if username.chars().any(|c| FORBIDDEN_USERNAME_CHARS.contains(c)) {
        return Err(ServiceError::field(
            "username",
            format!("Username must not contain any of {}", FORBIDDEN_USERNAME_CHARS),
        ));
    }
    Ok(())
}

/// Accounts and platform moderation of teachers
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Self-service signup. Teachers start on moderation.
    pub async fn register(&self, username: &str, role: GlobalRole) -> ServiceResult<User> {
        if role == GlobalRole::Staff {
            return Err(ServiceError::field("role", "Role must be student or teacher"));
        }
        self.insert(username, role).await
    }

    /// Operator path for staff accounts; not exposed over HTTP
    pub async fn create_staff(&self, username: &str) -> ServiceResult<User> {
        self.insert(username, GlobalRole::Staff).await
    }

    async fn insert(&self, username: &str, role: GlobalRole) -> ServiceResult<User> {
        validate_username(username)?;
        let user = User::new(username, role);

        let mut tx = self.store.begin().await?;
        if tx.user_by_username(username).await?.is_some() {
            return Err(ServiceError::Conflict(ConflictReason::UsernameTaken));
        }
        tx.insert_user(&user).await.on_unique(ConflictReason::UsernameTaken)?;
        tx.commit().await?;

        info!("Registered {} as {} ({})", user.username, user.role, user.status);
        Ok(user)
    }

    pub async fn by_id(&self, id: Uuid) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        tx.user_by_id(id).await?.ok_or(ServiceError::NotFound("user"))
    }

    pub async fn by_username(&self, username: &str) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        tx.user_by_username(username).await?.ok_or(ServiceError::NotFound("user"))
    }

    pub async fn moderate(&self, actor: &Principal, user_id: Uuid, status: ModerationStatus) -> ServiceResult<User> {
        permissions::require_staff(actor)?;
        self.set_status(user_id, status).await
    }

    /// Status change without a caller check, used by the CLI
    pub async fn set_status(&self, user_id: Uuid, status: ModerationStatus) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        let mut user = tx.user_by_id(user_id).await?.ok_or(ServiceError::NotFound("user"))?;
        tx.set_user_status(user_id, status).await?;
        tx.commit().await?;

        info!("User {} is now {}", user.username, status);
        user.status = status;
        Ok(user)
    }

    pub async fn list_users(
        &self,
        actor: &Principal,
        role: Option<GlobalRole>,
        status: Option<ModerationStatus>,
    ) -> ServiceResult<Vec<User>> {
        permissions::require_staff(actor)?;
        let mut tx = self.store.begin().await?;
        Ok(tx.list_users(role, status).await?)
    }
}
