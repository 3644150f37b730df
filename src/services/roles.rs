use uuid::Uuid;

use crate::auth::Principal;
use crate::database::{StoreResult, StoreTx};
use crate::types::CourseRole;

/// Effective role of `principal` inside `course_id`.
///
/// Staff and superusers resolve to `Staff` everywhere. Everyone else gets the
/// stored `course_roles` row, if any. Owning a course grants nothing by itself.
pub async fn effective_course_role(
    tx: &mut dyn StoreTx,
    principal: &Principal,
    course_id: Uuid,
) -> StoreResult<Option<CourseRole>> {
    if principal.is_staff() {
        return Ok(Some(CourseRole::Staff));
    }
    tx.course_role(course_id, principal.id).await
}

/// Role handed out on a plain join: staff keep their staff role inside the course
pub fn default_join_role(principal_is_staff: bool) -> CourseRole {
    if principal_is_staff {
        CourseRole::Staff
    } else {
        CourseRole::Student
    }
}
