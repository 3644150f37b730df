use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::{CourseJoinRequest, User};
use crate::database::{Store, StoreTx};
use crate::jobs::{Job, JobQueue};
use crate::services::error::{ConflictReason, OnUnique, ServiceError, ServiceResult};
use crate::services::load_course;
use crate::services::permissions::{self, Capability};
use crate::services::roles::{default_join_role, effective_course_role};
use crate::types::{Accessibility, CourseRole, JoinStatus};

/// Result of `request_to_join`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    /// The caller is a member now
    Joined,
    /// A request waits for a moderator
    Pending,
}

/// Acknowledgement for a moderation decision; the change lands when the job runs
#[derive(Debug, Clone, Serialize)]
pub struct DecisionAccepted {
    pub request_id: Uuid,
    pub status: JoinStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberInfo {
    pub user_id: Uuid,
    pub username: String,
    pub role: Option<CourseRole>,
}

/// Course membership, course roles and the join-request state machine
#[derive(Clone)]
pub struct MembershipService {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
}

impl MembershipService {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    pub async fn request_to_join(&self, principal: &Principal, course_id: Uuid) -> ServiceResult<JoinOutcome> {
        let mut tx = self.store.begin().await?;
        let course = load_course(tx.as_mut(), course_id).await?;
        let held_role = tx.course_role(course_id, principal.id).await?;
        let existing = tx.join_request_for(course_id, principal.id).await?;

        if principal.is_staff() || course.accessibility == Accessibility::Public || held_role.is_some() {
            tx.add_member(course_id, principal.id).await?;
            if held_role.is_none() {
                tx.upsert_course_role(course_id, principal.id, default_join_role(principal.is_staff()))
                    .await?;
            }
            match existing {
                Some(request) if request.status != JoinStatus::Approved => {
                    tx.set_join_request_status(request.id, JoinStatus::Approved).await?;
                }
                Some(_) => {}
                None => {
                    let request = CourseJoinRequest::new(course_id, principal.id, JoinStatus::Approved);
                    tx.insert_join_request(&request)
                        .await
                        .on_unique(ConflictReason::DuplicateRequest)?;
                }
            }
            tx.commit().await?;
            info!("User {} joined course {}", principal.username, course_id);
            return Ok(JoinOutcome::Joined);
        }

        match existing {
            None => {
                let request = CourseJoinRequest::new(course_id, principal.id, JoinStatus::OnMod);
                tx.insert_join_request(&request)
                    .await
                    .on_unique(ConflictReason::DuplicateRequest)?;
            }
            Some(request) => match request.status {
                JoinStatus::NotActive => {
                    tx.set_join_request_status(request.id, JoinStatus::OnMod).await?;
                }
                JoinStatus::OnMod => return Err(ServiceError::Conflict(ConflictReason::DuplicateRequest)),
                JoinStatus::Rejected => return Err(ServiceError::Conflict(ConflictReason::RequestRejected)),
                JoinStatus::Approved => {
                    if tx.is_member(course_id, principal.id).await? {
                        return Err(ServiceError::Conflict(ConflictReason::AlreadyMember));
                    }
                    tx.set_join_request_status(request.id, JoinStatus::OnMod).await?;
                }
            },
        }
        tx.commit().await?;
        info!("User {} requested to join course {}", principal.username, course_id);
        Ok(JoinOutcome::Pending)
    }

    /// Join through the course's invite code, bypassing moderation
    pub async fn join_by_code(&self, principal: &Principal, code: &str) -> ServiceResult<Uuid> {
        let mut tx = self.store.begin().await?;
        let course = tx
            .course_by_code(code)
            .await?
            .ok_or(ServiceError::NotFound("course"))?;

        if tx.is_member(course.id, principal.id).await? {
            return Err(ServiceError::Conflict(ConflictReason::AlreadyMember));
        }
        tx.add_member(course.id, principal.id).await?;
        if tx.course_role(course.id, principal.id).await?.is_none() {
            tx.upsert_course_role(course.id, principal.id, default_join_role(principal.is_staff()))
                .await?;
        }
        tx.commit().await?;

        info!("User {} joined course {} by code", principal.username, course.id);
        Ok(course.id)
    }

    /// Validate a moderator's decision and hand it to the job queue
    pub async fn approve_or_reject(
        &self,
        actor: &Principal,
        course_id: Uuid,
        request_id: Uuid,
        status: JoinStatus,
    ) -> ServiceResult<DecisionAccepted> {
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        permissions::require(tx.as_mut(), actor, course_id, Capability::CoLecturerOrAbove).await?;

        if !matches!(status, JoinStatus::Approved | JoinStatus::Rejected) {
            return Err(ServiceError::field("status", "Status must be approved or rejected"));
        }

        let request = tx
            .join_request_by_id(request_id)
            .await?
            .ok_or(ServiceError::NotFound("join request"))?;
        if request.course_id != course_id {
            return Err(ServiceError::InconsistentState(format!(
                "join request {} does not belong to course {}",
                request_id, course_id
            )));
        }
        if request.status != JoinStatus::OnMod {
            return Err(ServiceError::Conflict(ConflictReason::NotOnModeration));
        }
        if tx.is_member(course_id, request.user_id).await? {
            return Err(ServiceError::Conflict(ConflictReason::AlreadyMember));
        }
        drop(tx);

        self.queue
            .enqueue(Job::ApplyJoinDecision { request_id, status }, Duration::ZERO)
            .await
            .map_err(|e| ServiceError::Queue(e.to_string()))?;

        info!("Join request {} marked {} by {}", request_id, status, actor.username);
        Ok(DecisionAccepted { request_id, status })
    }

    /// Job side of `approve_or_reject`. Only acts on requests still on moderation.
    pub async fn apply_join_decision(&self, request_id: Uuid, status: JoinStatus) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(request) = tx.join_request_by_id(request_id).await? else {
            debug!("Join request {} vanished before its decision ran", request_id);
            return Ok(());
        };
        if request.status != JoinStatus::OnMod {
            debug!("Join request {} is {}, skipping {}", request_id, request.status, status);
            return Ok(());
        }

        match status {
            JoinStatus::Approved => {
                let user = tx
                    .user_by_id(request.user_id)
                    .await?
                    .ok_or(ServiceError::NotFound("user"))?;
                let is_staff = Principal::from(&user).is_staff();
                tx.add_member(request.course_id, request.user_id).await?;
                if tx.course_role(request.course_id, request.user_id).await?.is_none() {
                    tx.upsert_course_role(request.course_id, request.user_id, default_join_role(is_staff))
                        .await?;
                }
            }
            JoinStatus::Rejected => {}
            other => {
                return Err(ServiceError::validation(format!("Cannot apply status {}", other)));
            }
        }
        tx.set_join_request_status(request_id, status).await?;
        tx.commit().await?;

        info!("Join request {} is now {}", request_id, status);
        Ok(())
    }

    pub async fn kick(&self, actor: &Principal, course_id: Uuid, target_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let course = load_course(tx.as_mut(), course_id).await?;
        let actor_role = permissions::require(tx.as_mut(), actor, course_id, Capability::CoLecturerOrAbove).await?;

        if target_id == actor.id {
            return Err(ServiceError::field("user_id", "You cannot kick yourself"));
        }
        if !tx.is_member(course_id, target_id).await? {
            return Err(ServiceError::NotFound("member"));
        }

        let target_role = tx.course_role(course_id, target_id).await?;
        let outranked = actor_role == CourseRole::CoLecturer
            && matches!(target_role, Some(CourseRole::CoLecturer | CourseRole::Lecturer));
        if outranked || target_id == course.owner_id {
            return Err(ServiceError::PermissionDenied);
        }

        deactivate(tx.as_mut(), course_id, target_id).await?;
        tx.commit().await?;

        info!("User {} kicked {} from course {}", actor.username, target_id, course_id);
        Ok(())
    }

    pub async fn promote(
        &self,
        actor: &Principal,
        course_id: Uuid,
        target_id: Uuid,
        new_role: CourseRole,
    ) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let course = load_course(tx.as_mut(), course_id).await?;
        permissions::require(tx.as_mut(), actor, course_id, Capability::LecturerOrAbove).await?;

        if !matches!(new_role, CourseRole::Student | CourseRole::CoLecturer) {
            return Err(ServiceError::field("role", "Role must be student or co_lecturer"));
        }
        if tx.course_role(course_id, target_id).await?.is_none() {
            return Err(ServiceError::NotFound("course role"));
        }
        if target_id == course.owner_id {
            return Err(ServiceError::PermissionDenied);
        }

        tx.upsert_course_role(course_id, target_id, new_role).await?;
        tx.commit().await?;

        info!("User {} set {} to {} in course {}", actor.username, target_id, new_role, course_id);
        Ok(())
    }

    pub async fn leave(&self, principal: &Principal, course_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let course = load_course(tx.as_mut(), course_id).await?;

        if !tx.is_member(course_id, principal.id).await? {
            return Err(ServiceError::NotFound("membership"));
        }
        if course.owner_id == principal.id {
            return Err(ServiceError::Conflict(ConflictReason::OwnerCannotLeave));
        }

        deactivate(tx.as_mut(), course_id, principal.id).await?;
        tx.commit().await?;

        info!("User {} left course {}", principal.username, course_id);
        Ok(())
    }

    pub async fn list_join_requests(
        &self,
        actor: &Principal,
        course_id: Uuid,
        status: Option<JoinStatus>,
    ) -> ServiceResult<Vec<CourseJoinRequest>> {
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        permissions::require(tx.as_mut(), actor, course_id, Capability::CoLecturerOrAbove).await?;
        Ok(tx.list_join_requests(course_id, status).await?)
    }

    pub async fn list_members(&self, actor: &Principal, course_id: Uuid) -> ServiceResult<Vec<MemberInfo>> {
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        permissions::require(tx.as_mut(), actor, course_id, Capability::Student).await?;

        let mut members = Vec::new();
        for user_id in tx.list_members(course_id).await? {
            let Some(user) = tx.user_by_id(user_id).await? else {
                continue;
            };
            members.push(MemberInfo {
                user_id,
                username: user.username,
                role: tx.course_role(course_id, user_id).await?,
            });
        }
        Ok(members)
    }

    /// Staff override: put `user_id` into the course with `role`
    pub async fn admin_add_member(
        &self,
        actor: &Principal,
        course_id: Uuid,
        user_id: Uuid,
        role: CourseRole,
    ) -> ServiceResult<()> {
        permissions::require_staff(actor)?;
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        let user = load_user(tx.as_mut(), user_id).await?;
        check_override_role(&user, role)?;

        tx.add_member(course_id, user_id).await?;
        tx.upsert_course_role(course_id, user_id, role).await?;
        if let Some(request) = tx.join_request_for(course_id, user_id).await? {
            tx.set_join_request_status(request.id, JoinStatus::Approved).await?;
        }
        tx.commit().await?;

        info!("Staff {} added {} to course {} as {}", actor.username, user_id, course_id, role);
        Ok(())
    }

    pub async fn admin_remove_member(&self, actor: &Principal, course_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        permissions::require_staff(actor)?;
        let mut tx = self.store.begin().await?;
        let course = load_course(tx.as_mut(), course_id).await?;

        if course.owner_id == user_id {
            return Err(ServiceError::Conflict(ConflictReason::OwnerCannotLeave));
        }
        if !tx.is_member(course_id, user_id).await? {
            return Err(ServiceError::NotFound("member"));
        }
        deactivate(tx.as_mut(), course_id, user_id).await?;
        tx.commit().await?;

        info!("Staff {} removed {} from course {}", actor.username, user_id, course_id);
        Ok(())
    }

    pub async fn admin_set_role(
        &self,
        actor: &Principal,
        course_id: Uuid,
        user_id: Uuid,
        role: CourseRole,
    ) -> ServiceResult<()> {
        permissions::require_staff(actor)?;
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        let user = load_user(tx.as_mut(), user_id).await?;
        check_override_role(&user, role)?;

        if !tx.is_member(course_id, user_id).await? {
            return Err(ServiceError::NotFound("member"));
        }
        tx.upsert_course_role(course_id, user_id, role).await?;
        tx.commit().await?;

        info!("Staff {} set {} to {} in course {}", actor.username, user_id, role, course_id);
        Ok(())
    }

    /// Role of `principal` in the course, for clients deciding what to render
    pub async fn my_role(&self, principal: &Principal, course_id: Uuid) -> ServiceResult<Option<CourseRole>> {
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        Ok(effective_course_role(tx.as_mut(), principal, course_id).await?)
    }
}

/// Drop membership and role, and park any join request as `not_active`
async fn deactivate(tx: &mut dyn StoreTx, course_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
    tx.remove_member(course_id, user_id).await?;
    tx.delete_course_role(course_id, user_id).await?;
    if let Some(request) = tx.join_request_for(course_id, user_id).await? {
        tx.set_join_request_status(request.id, JoinStatus::NotActive).await?;
    }
    Ok(())
}

/// The course-level `staff` role is reserved for platform staff
fn check_override_role(user: &User, role: CourseRole) -> ServiceResult<()> {
    if role == CourseRole::Staff && !Principal::from(user).is_staff() {
        return Err(ServiceError::field("role", "Only staff accounts can hold the staff course role"));
    }
    Ok(())
}

async fn load_user(tx: &mut dyn StoreTx, user_id: Uuid) -> ServiceResult<User> {
    tx.user_by_id(user_id).await?.ok_or(ServiceError::NotFound("user"))
}
