use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Course, CourseJoinRequest, CourseRoleRow, CourseSection, SectionContent, TestAnswer, TestBlock,
    TestQuestion, TestSession, TestUserAnswer, User,
};
use crate::database::store::{Ordered, Store, StoreResult, StoreTx};
use crate::types::{CourseRole, GlobalRole, JoinStatus, ModerationStatus};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    courses: HashMap<Uuid, Course>,
    /// (course, user) in join order
    members: Vec<(Uuid, Uuid)>,
    roles: HashMap<(Uuid, Uuid), CourseRole>,
    join_requests: HashMap<Uuid, CourseJoinRequest>,
    sections: HashMap<Uuid, CourseSection>,
    blocks: HashMap<Uuid, SectionContent>,
    test_blocks: HashMap<Uuid, TestBlock>,
    questions: HashMap<Uuid, TestQuestion>,
    answers: HashMap<Uuid, TestAnswer>,
    sessions: HashMap<Uuid, TestSession>,
    user_answers: HashMap<Uuid, TestUserAnswer>,
}

impl MemoryState {
    fn unique(constraint: &str) -> DatabaseError {
        DatabaseError::UniqueViolation(constraint.to_string())
    }

    fn missing(what: &str, id: Uuid) -> DatabaseError {
        DatabaseError::NotFound(format!("{} {} not found", what, id))
    }

    fn order_taken(&self, kind: Ordered, parent_id: Uuid, order: i32, except: Option<Uuid>) -> bool {
        match kind {
            Ordered::Section => self
                .sections
                .values()
                .any(|s| s.course_id == parent_id && s.order == order && Some(s.id) != except),
            Ordered::Block => self
                .blocks
                .values()
                .any(|b| b.section_id == parent_id && b.order == order && Some(b.id) != except),
            Ordered::Question => self
                .questions
                .values()
                .any(|q| q.test_block_id == parent_id && q.order == order && Some(q.id) != except),
        }
    }

    fn cascade_session(&mut self, token: Uuid) {
        self.sessions.remove(&token);
        self.user_answers.retain(|_, a| a.session_token != token);
    }

    fn cascade_question(&mut self, id: Uuid) {
        self.questions.remove(&id);
        self.answers.retain(|_, a| a.question_id != id);
        self.user_answers.retain(|_, a| a.question_id != id);
    }

    fn cascade_test_block(&mut self, id: Uuid) {
        self.test_blocks.remove(&id);
        let questions: Vec<Uuid> = self
            .questions
            .values()
            .filter(|q| q.test_block_id == id)
            .map(|q| q.id)
            .collect();
        for question in questions {
            self.cascade_question(question);
        }
        let sessions: Vec<Uuid> = self
            .sessions
            .values()
            .filter(|s| s.test_block_id == id)
            .map(|s| s.token)
            .collect();
        for token in sessions {
            self.cascade_session(token);
        }
    }

    fn cascade_block(&mut self, id: Uuid) {
        self.blocks.remove(&id);
        let test_blocks: Vec<Uuid> = self
            .test_blocks
            .values()
            .filter(|t| t.block_id == id)
            .map(|t| t.id)
            .collect();
        for test_block in test_blocks {
            self.cascade_test_block(test_block);
        }
    }

    fn cascade_section(&mut self, id: Uuid) {
        self.sections.remove(&id);
        let blocks: Vec<Uuid> = self
            .blocks
            .values()
            .filter(|b| b.section_id == id)
            .map(|b| b.id)
            .collect();
        for block in blocks {
            self.cascade_block(block);
        }
    }

    fn cascade_course(&mut self, id: Uuid) {
        self.courses.remove(&id);
        self.members.retain(|(course, _)| *course != id);
        self.roles.retain(|(course, _), _| *course != id);
        self.join_requests.retain(|_, r| r.course_id != id);
        let sections: Vec<Uuid> = self
            .sections
            .values()
            .filter(|s| s.course_id == id)
            .map(|s| s.id)
            .collect();
        for section in sections {
            self.cascade_section(section);
        }
    }
}

/// Process-local store used by tests and the `memory` backend.
///
/// A transaction holds the state lock from `begin` until commit or drop, so
/// transactions are fully serialized. Writes go to a private copy that only
/// replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.work.users.values().find(|u| u.username == username).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.work.users.values().any(|u| u.username == user.username) {
            return Err(MemoryState::unique("users_username_key"));
        }
        self.work.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_user_status(&mut self, id: Uuid, status: ModerationStatus) -> StoreResult<()> {
        let user = self
            .work
            .users
            .get_mut(&id)
            .ok_or_else(|| MemoryState::missing("user", id))?;
        user.status = status;
        Ok(())
    }

    async fn list_users(
        &mut self,
        role: Option<GlobalRole>,
        status: Option<ModerationStatus>,
    ) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self
            .work
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .filter(|u| status.map_or(true, |s| u.status == s))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn course_by_id(&mut self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.work.courses.get(&id).cloned())
    }

    async fn course_by_code(&mut self, code: &str) -> StoreResult<Option<Course>> {
        Ok(self.work.courses.values().find(|c| c.course_code == code).cloned())
    }

    async fn insert_course(&mut self, course: &Course) -> StoreResult<()> {
        if self.work.courses.values().any(|c| c.course_code == course.course_code) {
            return Err(MemoryState::unique("courses_course_code_key"));
        }
        self.work.courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn update_course(&mut self, course: &Course) -> StoreResult<()> {
        if self
            .work
            .courses
            .values()
            .any(|c| c.course_code == course.course_code && c.id != course.id)
        {
            return Err(MemoryState::unique("courses_course_code_key"));
        }
        let existing = self
            .work
            .courses
            .get_mut(&course.id)
            .ok_or_else(|| MemoryState::missing("course", course.id))?;
        existing.title = course.title.clone();
        existing.short_description = course.short_description.clone();
        existing.course_code = course.course_code.clone();
        existing.accessibility = course.accessibility;
        Ok(())
    }

    async fn delete_course(&mut self, id: Uuid) -> StoreResult<()> {
        self.work.cascade_course(id);
        Ok(())
    }

    async fn is_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.work.members.contains(&(course_id, user_id)))
    }

    async fn add_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        if !self.work.members.contains(&(course_id, user_id)) {
            self.work.members.push((course_id, user_id));
        }
        Ok(())
    }

    async fn remove_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let before = self.work.members.len();
        self.work.members.retain(|pair| *pair != (course_id, user_id));
        Ok(self.work.members.len() != before)
    }

    async fn list_members(&mut self, course_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .work
            .members
            .iter()
            .filter(|(course, _)| *course == course_id)
            .map(|(_, user)| *user)
            .collect())
    }

    async fn course_role(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<Option<CourseRole>> {
        Ok(self.work.roles.get(&(course_id, user_id)).copied())
    }

    async fn upsert_course_role(&mut self, course_id: Uuid, user_id: Uuid, role: CourseRole) -> StoreResult<()> {
        self.work.roles.insert((course_id, user_id), role);
        Ok(())
    }

    async fn delete_course_role(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.work.roles.remove(&(course_id, user_id)).is_some())
    }

    async fn list_course_roles(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseRoleRow>> {
        Ok(self
            .work
            .roles
            .iter()
            .filter(|((course, _), _)| *course == course_id)
            .map(|((course, user), role)| CourseRoleRow {
                user_id: *user,
                course_id: *course,
                role: *role,
            })
            .collect())
    }

    async fn join_request_by_id(&mut self, id: Uuid) -> StoreResult<Option<CourseJoinRequest>> {
        Ok(self.work.join_requests.get(&id).cloned())
    }

    async fn join_request_for(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<Option<CourseJoinRequest>> {
        Ok(self
            .work
            .join_requests
            .values()
            .find(|r| r.course_id == course_id && r.user_id == user_id)
            .cloned())
    }

    async fn insert_join_request(&mut self, request: &CourseJoinRequest) -> StoreResult<()> {
        if self
            .work
            .join_requests
            .values()
            .any(|r| r.course_id == request.course_id && r.user_id == request.user_id)
        {
            return Err(MemoryState::unique("course_join_requests_course_user_key"));
        }
        self.work.join_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn set_join_request_status(&mut self, id: Uuid, status: JoinStatus) -> StoreResult<()> {
        let request = self
            .work
            .join_requests
            .get_mut(&id)
            .ok_or_else(|| MemoryState::missing("join request", id))?;
        request.status = status;
        request.updated_at = Utc::now();
        Ok(())
    }

    async fn list_join_requests(
        &mut self,
        course_id: Uuid,
        status: Option<JoinStatus>,
    ) -> StoreResult<Vec<CourseJoinRequest>> {
        let mut requests: Vec<CourseJoinRequest> = self
            .work
            .join_requests
            .values()
            .filter(|r| r.course_id == course_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn max_order(&mut self, kind: Ordered, parent_id: Uuid) -> StoreResult<i32> {
        let max = match kind {
            Ordered::Section => self
                .work
                .sections
                .values()
                .filter(|s| s.course_id == parent_id)
                .map(|s| s.order)
                .max(),
            Ordered::Block => self
                .work
                .blocks
                .values()
                .filter(|b| b.section_id == parent_id)
                .map(|b| b.order)
                .max(),
            Ordered::Question => self
                .work
                .questions
                .values()
                .filter(|q| q.test_block_id == parent_id)
                .map(|q| q.order)
                .max(),
        };
        Ok(max.unwrap_or(0))
    }

    async fn set_order(&mut self, kind: Ordered, id: Uuid, order: i32) -> StoreResult<()> {
        let parent = match kind {
            Ordered::Section => self.work.sections.get(&id).map(|s| s.course_id),
            Ordered::Block => self.work.blocks.get(&id).map(|b| b.section_id),
            Ordered::Question => self.work.questions.get(&id).map(|q| q.test_block_id),
        }
        .ok_or_else(|| MemoryState::missing(kind.table(), id))?;

        if self.work.order_taken(kind, parent, order, Some(id)) {
            return Err(MemoryState::unique(&format!("{}_order_key", kind.table())));
        }

        match kind {
            Ordered::Section => {
                if let Some(s) = self.work.sections.get_mut(&id) {
                    s.order = order;
                }
            }
            Ordered::Block => {
                if let Some(b) = self.work.blocks.get_mut(&id) {
                    b.order = order;
                }
            }
            Ordered::Question => {
                if let Some(q) = self.work.questions.get_mut(&id) {
                    q.order = order;
                }
            }
        }
        Ok(())
    }

    async fn section_by_id(&mut self, id: Uuid) -> StoreResult<Option<CourseSection>> {
        Ok(self.work.sections.get(&id).cloned())
    }

    async fn list_sections(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseSection>> {
        let mut sections: Vec<CourseSection> = self
            .work
            .sections
            .values()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect();
        sections.sort_by_key(|s| s.order);
        Ok(sections)
    }

    async fn insert_section(&mut self, section: &CourseSection) -> StoreResult<()> {
        if self.work.order_taken(Ordered::Section, section.course_id, section.order, None) {
            return Err(MemoryState::unique("course_sections_course_order_key"));
        }
        self.work.sections.insert(section.id, section.clone());
        Ok(())
    }

    async fn rename_section(&mut self, id: Uuid, name: &str) -> StoreResult<()> {
        let section = self
            .work
            .sections
            .get_mut(&id)
            .ok_or_else(|| MemoryState::missing("section", id))?;
        section.section_name = name.to_string();
        Ok(())
    }

    async fn delete_section(&mut self, id: Uuid) -> StoreResult<()> {
        self.work.cascade_section(id);
        Ok(())
    }

    async fn block_by_id(&mut self, id: Uuid) -> StoreResult<Option<SectionContent>> {
        Ok(self.work.blocks.get(&id).cloned())
    }

    async fn list_blocks(&mut self, section_id: Uuid) -> StoreResult<Vec<SectionContent>> {
        let mut blocks: Vec<SectionContent> = self
            .work
            .blocks
            .values()
            .filter(|b| b.section_id == section_id)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| b.order);
        Ok(blocks)
    }

    async fn insert_block(&mut self, block: &SectionContent) -> StoreResult<()> {
        if self.work.order_taken(Ordered::Block, block.section_id, block.order, None) {
            return Err(MemoryState::unique("section_contents_section_order_key"));
        }
        self.work.blocks.insert(block.id, block.clone());
        Ok(())
    }

    async fn update_block(&mut self, block: &SectionContent) -> StoreResult<()> {
        let existing = self
            .work
            .blocks
            .get_mut(&block.id)
            .ok_or_else(|| MemoryState::missing("block", block.id))?;
        existing.title = block.title.clone();
        existing.content = block.content.clone();
        Ok(())
    }

    async fn delete_block(&mut self, id: Uuid) -> StoreResult<()> {
        self.work.cascade_block(id);
        Ok(())
    }

    async fn test_block_by_id(&mut self, id: Uuid) -> StoreResult<Option<TestBlock>> {
        Ok(self.work.test_blocks.get(&id).cloned())
    }

    async fn test_block_for_block(&mut self, block_id: Uuid) -> StoreResult<Option<TestBlock>> {
        Ok(self
            .work
            .test_blocks
            .values()
            .find(|t| t.block_id == block_id)
            .cloned())
    }

    async fn insert_test_block(&mut self, test_block: &TestBlock) -> StoreResult<()> {
        if self.work.test_blocks.values().any(|t| t.block_id == test_block.block_id) {
            return Err(MemoryState::unique("test_blocks_block_id_key"));
        }
        self.work.test_blocks.insert(test_block.id, test_block.clone());
        Ok(())
    }

    async fn update_test_block(&mut self, test_block: &TestBlock) -> StoreResult<()> {
        let existing = self
            .work
            .test_blocks
            .get_mut(&test_block.id)
            .ok_or_else(|| MemoryState::missing("test block", test_block.id))?;
        existing.time_for_test = test_block.time_for_test;
        existing.possible_retries = test_block.possible_retries;
        Ok(())
    }

    async fn question_by_id(&mut self, id: Uuid) -> StoreResult<Option<TestQuestion>> {
        Ok(self.work.questions.get(&id).cloned())
    }

    async fn list_questions(&mut self, test_block_id: Uuid) -> StoreResult<Vec<TestQuestion>> {
        let mut questions: Vec<TestQuestion> = self
            .work
            .questions
            .values()
            .filter(|q| q.test_block_id == test_block_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        Ok(questions)
    }

    async fn insert_question(&mut self, question: &TestQuestion) -> StoreResult<()> {
        if self
            .work
            .order_taken(Ordered::Question, question.test_block_id, question.order, None)
        {
            return Err(MemoryState::unique("test_questions_block_order_key"));
        }
        self.work.questions.insert(question.id, question.clone());
        Ok(())
    }

    async fn update_question(&mut self, question: &TestQuestion) -> StoreResult<()> {
        let existing = self
            .work
            .questions
            .get_mut(&question.id)
            .ok_or_else(|| MemoryState::missing("question", question.id))?;
        existing.question = question.question.clone();
        existing.answers_type = question.answers_type;
        existing.max_points = question.max_points;
        Ok(())
    }

    async fn delete_question(&mut self, id: Uuid) -> StoreResult<()> {
        self.work.cascade_question(id);
        Ok(())
    }

    async fn list_answers(&mut self, question_id: Uuid) -> StoreResult<Vec<TestAnswer>> {
        let mut answers: Vec<TestAnswer> = self
            .work
            .answers
            .values()
            .filter(|a| a.question_id == question_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.order);
        Ok(answers)
    }

    async fn insert_answer(&mut self, answer: &TestAnswer) -> StoreResult<()> {
        if self
            .work
            .answers
            .values()
            .any(|a| a.question_id == answer.question_id && a.order == answer.order)
        {
            return Err(MemoryState::unique("test_answers_question_order_key"));
        }
        self.work.answers.insert(answer.id, answer.clone());
        Ok(())
    }

    async fn delete_answers(&mut self, question_id: Uuid) -> StoreResult<()> {
        self.work.answers.retain(|_, a| a.question_id != question_id);
        Ok(())
    }

    async fn lock_session_slot(&mut self, _user_id: Uuid, _test_block_id: Uuid) -> StoreResult<()> {
        // The transaction already holds the whole-store lock.
        Ok(())
    }

    async fn count_sessions(&mut self, user_id: Uuid, test_block_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .work
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.test_block_id == test_block_id)
            .count() as i64)
    }

    async fn active_session(&mut self, user_id: Uuid, test_block_id: Uuid) -> StoreResult<Option<TestSession>> {
        Ok(self
            .work
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.test_block_id == test_block_id && !s.is_finished)
            .cloned())
    }

    async fn session_by_token(&mut self, token: Uuid) -> StoreResult<Option<TestSession>> {
        Ok(self.work.sessions.get(&token).cloned())
    }

    async fn session_for_update(&mut self, token: Uuid) -> StoreResult<Option<TestSession>> {
        Ok(self.work.sessions.get(&token).cloned())
    }

    async fn insert_session(&mut self, session: &TestSession) -> StoreResult<()> {
        if !session.is_finished
            && self.work.sessions.values().any(|s| {
                s.user_id == session.user_id && s.test_block_id == session.test_block_id && !s.is_finished
            })
        {
            return Err(MemoryState::unique("test_sessions_one_active_idx"));
        }
        self.work.sessions.insert(session.token, session.clone());
        Ok(())
    }

    async fn finish_session(&mut self, token: Uuid, finished_at: DateTime<Utc>, score: f64) -> StoreResult<()> {
        let session = self
            .work
            .sessions
            .get_mut(&token)
            .ok_or_else(|| MemoryState::missing("session", token))?;
        session.is_finished = true;
        session.finished_at = Some(finished_at);
        session.summary_score = score;
        Ok(())
    }

    async fn expired_sessions(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let mut expired: Vec<&TestSession> = self
            .work
            .sessions
            .values()
            .filter(|s| {
                self.work
                    .test_blocks
                    .get(&s.test_block_id)
                    .map_or(false, |t| s.is_expired(t.time_limit(), now))
            })
            .collect();
        expired.sort_by_key(|s| s.started_at);
        Ok(expired.into_iter().map(|s| s.token).collect())
    }

    async fn user_answer(&mut self, session_token: Uuid, question_id: Uuid) -> StoreResult<Option<TestUserAnswer>> {
        Ok(self
            .work
            .user_answers
            .values()
            .find(|a| a.session_token == session_token && a.question_id == question_id)
            .cloned())
    }

    async fn list_user_answers(&mut self, session_token: Uuid) -> StoreResult<Vec<TestUserAnswer>> {
        let mut answers: Vec<TestUserAnswer> = self
            .work
            .user_answers
            .values()
            .filter(|a| a.session_token == session_token)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.answered_at);
        Ok(answers)
    }

    async fn delete_user_answer(&mut self, session_token: Uuid, question_id: Uuid) -> StoreResult<()> {
        self.work
            .user_answers
            .retain(|_, a| !(a.session_token == session_token && a.question_id == question_id));
        Ok(())
    }

    async fn insert_user_answer(&mut self, answer: &TestUserAnswer) -> StoreResult<()> {
        if self
            .work
            .user_answers
            .values()
            .any(|a| a.session_token == answer.session_token && a.question_id == answer.question_id)
        {
            return Err(MemoryState::unique("test_user_answers_session_question_key"));
        }
        self.work.user_answers.insert(answer.id, answer.clone());
        Ok(())
    }

    async fn set_user_answer_score(&mut self, id: Uuid, score: f64) -> StoreResult<()> {
        let answer = self
            .work
            .user_answers
            .get_mut(&id)
            .ok_or_else(|| MemoryState::missing("user answer", id))?;
        answer.score = score;
        Ok(())
    }
}
