pub mod courses;
pub mod error;
pub mod membership;
pub mod ordering;
pub mod permissions;
pub mod quiz;
pub mod roles;
pub mod scoring;
pub mod sessions;
pub mod users;

use std::sync::Arc;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::models::{Course, CourseSection, SectionContent, TestBlock};
use crate::database::{Store, StoreTx};
use crate::jobs::JobQueue;

pub use courses::CourseService;
pub use error::{ConflictReason, ServiceError, ServiceResult};
pub use membership::MembershipService;
pub use quiz::QuizService;
pub use sessions::SessionService;
pub use users::UserService;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn JobQueue>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>, config: AppConfig) -> Self {
        Self {
            store,
            queue,
            config: Arc::new(config),
        }
    }

    pub fn courses(&self) -> CourseService {
        CourseService::new(self.store.clone(), self.config.course.clone())
    }

    pub fn membership(&self) -> MembershipService {
        MembershipService::new(self.store.clone(), self.queue.clone())
    }

    pub fn quiz(&self) -> QuizService {
        QuizService::new(self.store.clone())
    }

    pub fn sessions(&self) -> SessionService {
        SessionService::new(self.store.clone(), self.queue.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.store.clone())
    }
}

pub(crate) async fn load_course(tx: &mut dyn StoreTx, course_id: Uuid) -> ServiceResult<Course> {
    tx.course_by_id(course_id).await?.ok_or(ServiceError::NotFound("course"))
}

pub(crate) async fn load_section(tx: &mut dyn StoreTx, section_id: Uuid) -> ServiceResult<CourseSection> {
    tx.section_by_id(section_id).await?.ok_or(ServiceError::NotFound("section"))
}

/// A block together with the section that holds it
pub(crate) async fn load_block(tx: &mut dyn StoreTx, block_id: Uuid) -> ServiceResult<(SectionContent, CourseSection)> {
    let block = tx.block_by_id(block_id).await?.ok_or(ServiceError::NotFound("block"))?;
    let section = tx
        .section_by_id(block.section_id)
        .await?
        .ok_or_else(|| ServiceError::InconsistentState(format!("block {} has no section", block_id)))?;
    Ok((block, section))
}

/// Course a test block lives in, walking block -> section -> course
pub(crate) async fn course_for_test_block(tx: &mut dyn StoreTx, test_block: &TestBlock) -> ServiceResult<Uuid> {
    let (_, section) = load_block(tx, test_block.block_id).await?;
    Ok(section.course_id)
}
