use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Course, CourseJoinRequest, CourseRoleRow, CourseSection, SectionContent, TestAnswer, TestBlock,
    TestQuestion, TestSession, TestUserAnswer, User,
};
use crate::types::{CourseRole, GlobalRole, JoinStatus, ModerationStatus};

pub type StoreResult<T> = Result<T, DatabaseError>;

/// Entities that carry a dense per-parent `order`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordered {
    /// Sections within a course
    Section,
    /// Blocks within a section
    Block,
    /// Questions within a test block
    Question,
}

impl Ordered {
    pub fn table(&self) -> &'static str {
        match self {
            Ordered::Section => "course_sections",
            Ordered::Block => "section_contents",
            Ordered::Question => "test_questions",
        }
    }

    pub fn parent_column(&self) -> &'static str {
        match self {
            Ordered::Section => "course_id",
            Ordered::Block => "section_id",
            Ordered::Question => "test_block_id",
        }
    }
}

/// Entry point to persistence. Every unit of work runs inside one transaction.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// An open transaction. Dropping it without `commit` rolls everything back.
#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    // Users
    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>>;
    async fn user_by_username(&mut self, username: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;
    async fn set_user_status(&mut self, id: Uuid, status: ModerationStatus) -> StoreResult<()>;
    async fn list_users(
        &mut self,
        role: Option<GlobalRole>,
        status: Option<ModerationStatus>,
    ) -> StoreResult<Vec<User>>;

    // Courses
    async fn course_by_id(&mut self, id: Uuid) -> StoreResult<Option<Course>>;
    async fn course_by_code(&mut self, code: &str) -> StoreResult<Option<Course>>;
    async fn insert_course(&mut self, course: &Course) -> StoreResult<()>;
    async fn update_course(&mut self, course: &Course) -> StoreResult<()>;
    /// Deletes the course and everything under it
    async fn delete_course(&mut self, id: Uuid) -> StoreResult<()>;

    // Membership
    async fn is_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    /// No-op when the pair already exists
    async fn add_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    async fn remove_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn list_members(&mut self, course_id: Uuid) -> StoreResult<Vec<Uuid>>;

    // Course roles
    async fn course_role(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<Option<CourseRole>>;
    /// Inserts or overwrites the role for the pair
    async fn upsert_course_role(&mut self, course_id: Uuid, user_id: Uuid, role: CourseRole) -> StoreResult<()>;
    async fn delete_course_role(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn list_course_roles(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseRoleRow>>;

    // Join requests
    async fn join_request_by_id(&mut self, id: Uuid) -> StoreResult<Option<CourseJoinRequest>>;
    async fn join_request_for(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<Option<CourseJoinRequest>>;
    async fn insert_join_request(&mut self, request: &CourseJoinRequest) -> StoreResult<()>;
    async fn set_join_request_status(&mut self, id: Uuid, status: JoinStatus) -> StoreResult<()>;
    async fn list_join_requests(
        &mut self,
        course_id: Uuid,
        status: Option<JoinStatus>,
    ) -> StoreResult<Vec<CourseJoinRequest>>;

    // Ordering
    /// Highest `order` under `parent_id`, 0 when empty
    async fn max_order(&mut self, kind: Ordered, parent_id: Uuid) -> StoreResult<i32>;
    async fn set_order(&mut self, kind: Ordered, id: Uuid, order: i32) -> StoreResult<()>;

    // Sections
    async fn section_by_id(&mut self, id: Uuid) -> StoreResult<Option<CourseSection>>;
    async fn list_sections(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseSection>>;
    async fn insert_section(&mut self, section: &CourseSection) -> StoreResult<()>;
    async fn rename_section(&mut self, id: Uuid, name: &str) -> StoreResult<()>;
    async fn delete_section(&mut self, id: Uuid) -> StoreResult<()>;

    // Blocks
    async fn block_by_id(&mut self, id: Uuid) -> StoreResult<Option<SectionContent>>;
    async fn list_blocks(&mut self, section_id: Uuid) -> StoreResult<Vec<SectionContent>>;
    async fn insert_block(&mut self, block: &SectionContent) -> StoreResult<()>;
    async fn update_block(&mut self, block: &SectionContent) -> StoreResult<()>;
    async fn delete_block(&mut self, id: Uuid) -> StoreResult<()>;

    // Test blocks
    async fn test_block_by_id(&mut self, id: Uuid) -> StoreResult<Option<TestBlock>>;
    async fn test_block_for_block(&mut self, block_id: Uuid) -> StoreResult<Option<TestBlock>>;
    async fn insert_test_block(&mut self, test_block: &TestBlock) -> StoreResult<()>;
    async fn update_test_block(&mut self, test_block: &TestBlock) -> StoreResult<()>;

    // Questions and answers
    async fn question_by_id(&mut self, id: Uuid) -> StoreResult<Option<TestQuestion>>;
    async fn list_questions(&mut self, test_block_id: Uuid) -> StoreResult<Vec<TestQuestion>>;
    async fn insert_question(&mut self, question: &TestQuestion) -> StoreResult<()>;
    async fn update_question(&mut self, question: &TestQuestion) -> StoreResult<()>;
    async fn delete_question(&mut self, id: Uuid) -> StoreResult<()>;
    async fn list_answers(&mut self, question_id: Uuid) -> StoreResult<Vec<TestAnswer>>;
    async fn insert_answer(&mut self, answer: &TestAnswer) -> StoreResult<()>;
    async fn delete_answers(&mut self, question_id: Uuid) -> StoreResult<()>;

    // Sessions
    /// Serializes session creation for one (user, test block) pair until commit
    async fn lock_session_slot(&mut self, user_id: Uuid, test_block_id: Uuid) -> StoreResult<()>;
    async fn count_sessions(&mut self, user_id: Uuid, test_block_id: Uuid) -> StoreResult<i64>;
    async fn active_session(&mut self, user_id: Uuid, test_block_id: Uuid) -> StoreResult<Option<TestSession>>;
    async fn session_by_token(&mut self, token: Uuid) -> StoreResult<Option<TestSession>>;
    /// Same as `session_by_token` but holds a row lock until commit
    async fn session_for_update(&mut self, token: Uuid) -> StoreResult<Option<TestSession>>;
    async fn insert_session(&mut self, session: &TestSession) -> StoreResult<()>;
    async fn finish_session(&mut self, token: Uuid, finished_at: DateTime<Utc>, score: f64) -> StoreResult<()>;
    /// Tokens of unfinished sessions whose deadline is at or before `now`
    async fn expired_sessions(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;

    // Recorded answers
    async fn user_answer(&mut self, session_token: Uuid, question_id: Uuid) -> StoreResult<Option<TestUserAnswer>>;
    async fn list_user_answers(&mut self, session_token: Uuid) -> StoreResult<Vec<TestUserAnswer>>;
    async fn delete_user_answer(&mut self, session_token: Uuid, question_id: Uuid) -> StoreResult<()>;
    async fn insert_user_answer(&mut self, answer: &TestUserAnswer) -> StoreResult<()>;
    async fn set_user_answer_score(&mut self, id: Uuid, score: f64) -> StoreResult<()>;
}
