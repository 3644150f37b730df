use tracing::warn;
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::StoreTx;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::roles::effective_course_role;
use crate::types::{CourseRole, GlobalRole, ModerationStatus};

/// What an operation needs from the caller's course role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Student,
    CoLecturerOrAbove,
    LecturerOrAbove,
    Staff,
}

pub fn has_capability(role: Option<CourseRole>, capability: Capability) -> bool {
    use CourseRole::*;
    match (capability, role) {
        (_, None) => false,
        (Capability::Student, Some(_)) => true,
        (Capability::CoLecturerOrAbove, Some(r)) => matches!(r, CoLecturer | Lecturer | Staff),
        (Capability::LecturerOrAbove, Some(r)) => matches!(r, Lecturer | Staff),
        (Capability::Staff, Some(r)) => r == Staff,
    }
}

/// Resolve the caller's role in `course_id` and fail unless it grants `capability`.
/// Returns the resolved role so callers can make finer decisions.
pub async fn require(
    tx: &mut dyn StoreTx,
    principal: &Principal,
    course_id: Uuid,
    capability: Capability,
) -> ServiceResult<CourseRole> {
    let role = effective_course_role(tx, principal, course_id).await?;
    match role {
        Some(role) if has_capability(Some(role), capability) => Ok(role),
        _ => {
            warn!(
                "Permission denied: user {} lacks {:?} on course {} (role {:?})",
                principal.username, capability, course_id, role
            );
            Err(ServiceError::PermissionDenied)
        }
    }
}

pub fn is_verified_teacher(principal: &Principal) -> bool {
    principal.role == GlobalRole::Teacher && principal.status == ModerationStatus::Approved
}

pub fn require_verified_teacher(principal: &Principal) -> ServiceResult<()> {
    if is_verified_teacher(principal) {
        Ok(())
    } else {
        warn!("Permission denied: {} is not a verified teacher", principal.username);
        Err(ServiceError::PermissionDenied)
    }
}

pub fn require_staff(principal: &Principal) -> ServiceResult<()> {
    if principal.is_staff() {
        Ok(())
    } else {
        warn!("Permission denied: {} is not staff", principal.username);
        Err(ServiceError::PermissionDenied)
    }
}
