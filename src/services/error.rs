use std::collections::HashMap;

use thiserror::Error;

use crate::database::DatabaseError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Why a well-formed request collided with current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    DuplicateRequest,
    RequestRejected,
    AlreadyMember,
    NotOnModeration,
    RetryLimitExceeded,
    SameItemSwap,
    SessionFinished,
    OwnerCannotLeave,
    UsernameTaken,
}

impl ConflictReason {
    pub fn code(&self) -> &'static str {
        match self {
            ConflictReason::DuplicateRequest => "DUPLICATE_REQUEST",
            ConflictReason::RequestRejected => "REQUEST_REJECTED",
            ConflictReason::AlreadyMember => "ALREADY_MEMBER",
            ConflictReason::NotOnModeration => "NOT_ON_MODERATION",
            ConflictReason::RetryLimitExceeded => "RETRY_LIMIT_EXCEEDED",
            ConflictReason::SameItemSwap => "SAME_ITEM_SWAP",
            ConflictReason::SessionFinished => "SESSION_FINISHED",
            ConflictReason::OwnerCannotLeave => "OWNER_CANNOT_LEAVE",
            ConflictReason::UsernameTaken => "USERNAME_TAKEN",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ConflictReason::DuplicateRequest => "A join request is already pending",
            ConflictReason::RequestRejected => "The join request was rejected",
            ConflictReason::AlreadyMember => "User is already a member of this course",
            ConflictReason::NotOnModeration => "The join request is no longer on moderation",
            ConflictReason::RetryLimitExceeded => "No retries left for this test",
            ConflictReason::SameItemSwap => "Cannot swap an item with itself",
            ConflictReason::SessionFinished => "The test session is already finished",
            ConflictReason::OwnerCannotLeave => "The course owner cannot leave the course",
            ConflictReason::UsernameTaken => "Username is already taken",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("{message}")]
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{}", .0.message())]
    Conflict(ConflictReason),

    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    #[error(transparent)]
    Database(DatabaseError),

    #[error("Job queue error: {0}")]
    Queue(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: HashMap::new(),
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), message.clone());
        ServiceError::Validation { message, field_errors }
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        ServiceError::Database(err)
    }
}

/// Extension for results whose unique-violation means a known conflict
pub trait OnUnique<T> {
    fn on_unique(self, reason: ConflictReason) -> ServiceResult<T>;
}

impl<T> OnUnique<T> for Result<T, DatabaseError> {
    fn on_unique(self, reason: ConflictReason) -> ServiceResult<T> {
        self.map_err(|err| match err {
            DatabaseError::UniqueViolation(_) => ServiceError::Conflict(reason),
            other => ServiceError::Database(other),
        })
    }
}
