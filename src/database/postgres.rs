use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{
    Course, CourseJoinRequest, CourseRoleRow, CourseSection, SectionContent, TestAnswer, TestBlock,
    TestQuestion, TestSession, TestUserAnswer, User,
};
use crate::database::store::{Ordered, Store, StoreResult, StoreTx};
use crate::types::{CourseRole, GlobalRole, JoinStatus, ModerationStatus};

const USER_COLUMNS: &str = "id, username, role, status, is_superuser, created_at";
const COURSE_COLUMNS: &str =
    "id, owner_id, title, short_description, course_code, accessibility, created_at";
const REQUEST_COLUMNS: &str = "id, course_id, user_id, status, created_at, updated_at";
const SESSION_COLUMNS: &str =
    "token, user_id, test_block_id, started_at, finished_at, is_finished, summary_score";
const USER_ANSWER_COLUMNS: &str =
    "id, session_token, question_id, selected_answers, score, answered_at";

/// Postgres-backed store. Each `begin` checks out a connection and opens a transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, role, status, is_superuser, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.is_superuser)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_user_status(&mut self, id: Uuid, status: ModerationStatus) -> StoreResult<()> {
        sqlx::query("UPDATE users SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_users(
        &mut self,
        role: Option<GlobalRole>,
        status: Option<ModerationStatus>,
    ) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE ($1::text IS NULL OR role = $1) AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(role.map(|r| r.as_str()))
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn course_by_id(&mut self, id: Uuid) -> StoreResult<Option<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn course_by_code(&mut self, code: &str) -> StoreResult<Option<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE course_code = $1");
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_course(&mut self, course: &Course) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO courses (id, owner_id, title, short_description, course_code, accessibility, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(course.id)
        .bind(course.owner_id)
        .bind(&course.title)
        .bind(&course.short_description)
        .bind(&course.course_code)
        .bind(course.accessibility.as_str())
        .bind(course.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_course(&mut self, course: &Course) -> StoreResult<()> {
        sqlx::query(
            "UPDATE courses
             SET title = $2, short_description = $3, course_code = $4, accessibility = $5
             WHERE id = $1",
        )
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.short_description)
        .bind(&course.course_code)
        .bind(course.accessibility.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_course(&mut self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn is_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM course_members WHERE course_id = $1 AND user_id = $2)",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.0)
    }

    async fn add_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO course_members (course_id, user_id) VALUES ($1, $2)
             ON CONFLICT (course_id, user_id) DO NOTHING",
        )
        .bind(course_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn remove_member(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM course_members WHERE course_id = $1 AND user_id = $2")
            .bind(course_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_members(&mut self, course_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM course_members WHERE course_id = $1 ORDER BY joined_at",
        )
        .bind(course_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn course_role(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<Option<CourseRole>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT role FROM course_roles WHERE course_id = $1 AND user_id = $2")
                .bind(course_id)
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(|(role,)| role.parse::<CourseRole>())
            .transpose()
            .map_err(crate::database::DatabaseError::QueryError)
    }

    async fn upsert_course_role(&mut self, course_id: Uuid, user_id: Uuid, role: CourseRole) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO course_roles (course_id, user_id, role) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, course_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(course_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_course_role(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM course_roles WHERE course_id = $1 AND user_id = $2")
            .bind(course_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_course_roles(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseRoleRow>> {
        Ok(sqlx::query_as::<_, CourseRoleRow>(
            "SELECT user_id, course_id, role FROM course_roles WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn join_request_by_id(&mut self, id: Uuid) -> StoreResult<Option<CourseJoinRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM course_join_requests WHERE id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, CourseJoinRequest>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn join_request_for(&mut self, course_id: Uuid, user_id: Uuid) -> StoreResult<Option<CourseJoinRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM course_join_requests
             WHERE course_id = $1 AND user_id = $2 FOR UPDATE"
        );
        Ok(sqlx::query_as::<_, CourseJoinRequest>(&sql)
            .bind(course_id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_join_request(&mut self, request: &CourseJoinRequest) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO course_join_requests (id, course_id, user_id, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(request.id)
        .bind(request.course_id)
        .bind(request.user_id)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_join_request_status(&mut self, id: Uuid, status: JoinStatus) -> StoreResult<()> {
        sqlx::query("UPDATE course_join_requests SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_join_requests(
        &mut self,
        course_id: Uuid,
        status: Option<JoinStatus>,
    ) -> StoreResult<Vec<CourseJoinRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM course_join_requests
             WHERE course_id = $1 AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at"
        );
        Ok(sqlx::query_as::<_, CourseJoinRequest>(&sql)
            .bind(course_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn max_order(&mut self, kind: Ordered, parent_id: Uuid) -> StoreResult<i32> {
        let sql = format!(
            "SELECT COALESCE(MAX(\"order\"), 0) FROM {} WHERE {} = $1",
            kind.table(),
            kind.parent_column()
        );
        let row: (i32,) = sqlx::query_as(&sql)
            .bind(parent_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.0)
    }

    async fn set_order(&mut self, kind: Ordered, id: Uuid, order: i32) -> StoreResult<()> {
        let sql = format!("UPDATE {} SET \"order\" = $2 WHERE id = $1", kind.table());
        sqlx::query(&sql)
            .bind(id)
            .bind(order)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn section_by_id(&mut self, id: Uuid) -> StoreResult<Option<CourseSection>> {
        Ok(sqlx::query_as::<_, CourseSection>(
            "SELECT id, course_id, section_name, \"order\" FROM course_sections WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn list_sections(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseSection>> {
        Ok(sqlx::query_as::<_, CourseSection>(
            "SELECT id, course_id, section_name, \"order\" FROM course_sections
             WHERE course_id = $1 ORDER BY \"order\"",
        )
        .bind(course_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn insert_section(&mut self, section: &CourseSection) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO course_sections (id, course_id, section_name, \"order\") VALUES ($1, $2, $3, $4)",
        )
        .bind(section.id)
        .bind(section.course_id)
        .bind(&section.section_name)
        .bind(section.order)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn rename_section(&mut self, id: Uuid, name: &str) -> StoreResult<()> {
        sqlx::query("UPDATE course_sections SET section_name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_section(&mut self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM course_sections WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn block_by_id(&mut self, id: Uuid) -> StoreResult<Option<SectionContent>> {
        Ok(sqlx::query_as::<_, SectionContent>(
            "SELECT id, section_id, title, content, content_type, \"order\" FROM section_contents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn list_blocks(&mut self, section_id: Uuid) -> StoreResult<Vec<SectionContent>> {
        Ok(sqlx::query_as::<_, SectionContent>(
            "SELECT id, section_id, title, content, content_type, \"order\" FROM section_contents
             WHERE section_id = $1 ORDER BY \"order\"",
        )
        .bind(section_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn insert_block(&mut self, block: &SectionContent) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO section_contents (id, section_id, title, content, content_type, \"order\")
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(block.id)
        .bind(block.section_id)
        .bind(&block.title)
        .bind(&block.content)
        .bind(block.content_type.as_str())
        .bind(block.order)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_block(&mut self, block: &SectionContent) -> StoreResult<()> {
        sqlx::query("UPDATE section_contents SET title = $2, content = $3 WHERE id = $1")
            .bind(block.id)
            .bind(&block.title)
            .bind(&block.content)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_block(&mut self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM section_contents WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn test_block_by_id(&mut self, id: Uuid) -> StoreResult<Option<TestBlock>> {
        Ok(sqlx::query_as::<_, TestBlock>(
            "SELECT id, block_id, time_for_test, possible_retries FROM test_blocks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn test_block_for_block(&mut self, block_id: Uuid) -> StoreResult<Option<TestBlock>> {
        Ok(sqlx::query_as::<_, TestBlock>(
            "SELECT id, block_id, time_for_test, possible_retries FROM test_blocks WHERE block_id = $1",
        )
        .bind(block_id)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn insert_test_block(&mut self, test_block: &TestBlock) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO test_blocks (id, block_id, time_for_test, possible_retries) VALUES ($1, $2, $3, $4)",
        )
        .bind(test_block.id)
        .bind(test_block.block_id)
        .bind(test_block.time_for_test)
        .bind(test_block.possible_retries)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_test_block(&mut self, test_block: &TestBlock) -> StoreResult<()> {
        sqlx::query("UPDATE test_blocks SET time_for_test = $2, possible_retries = $3 WHERE id = $1")
            .bind(test_block.id)
            .bind(test_block.time_for_test)
            .bind(test_block.possible_retries)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn question_by_id(&mut self, id: Uuid) -> StoreResult<Option<TestQuestion>> {
        Ok(sqlx::query_as::<_, TestQuestion>(
            "SELECT id, test_block_id, \"order\", question, answers_type, max_points
             FROM test_questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn list_questions(&mut self, test_block_id: Uuid) -> StoreResult<Vec<TestQuestion>> {
        Ok(sqlx::query_as::<_, TestQuestion>(
            "SELECT id, test_block_id, \"order\", question, answers_type, max_points
             FROM test_questions WHERE test_block_id = $1 ORDER BY \"order\"",
        )
        .bind(test_block_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn insert_question(&mut self, question: &TestQuestion) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO test_questions (id, test_block_id, \"order\", question, answers_type, max_points)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(question.id)
        .bind(question.test_block_id)
        .bind(question.order)
        .bind(&question.question)
        .bind(question.answers_type.as_str())
        .bind(question.max_points)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_question(&mut self, question: &TestQuestion) -> StoreResult<()> {
        sqlx::query(
            "UPDATE test_questions SET question = $2, answers_type = $3, max_points = $4 WHERE id = $1",
        )
        .bind(question.id)
        .bind(&question.question)
        .bind(question.answers_type.as_str())
        .bind(question.max_points)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_question(&mut self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM test_questions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_answers(&mut self, question_id: Uuid) -> StoreResult<Vec<TestAnswer>> {
        Ok(sqlx::query_as::<_, TestAnswer>(
            "SELECT id, question_id, \"order\", answer_text, is_correct
             FROM test_answers WHERE question_id = $1 ORDER BY \"order\"",
        )
        .bind(question_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn insert_answer(&mut self, answer: &TestAnswer) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO test_answers (id, question_id, \"order\", answer_text, is_correct)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(answer.id)
        .bind(answer.question_id)
        .bind(answer.order)
        .bind(&answer.answer_text)
        .bind(answer.is_correct)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_answers(&mut self, question_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM test_answers WHERE question_id = $1")
            .bind(question_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_session_slot(&mut self, user_id: Uuid, test_block_id: Uuid) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text || ':' || $2::text))")
            .bind(user_id)
            .bind(test_block_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn count_sessions(&mut self, user_id: Uuid, test_block_id: Uuid) -> StoreResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM test_sessions WHERE user_id = $1 AND test_block_id = $2",
        )
        .bind(user_id)
        .bind(test_block_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.0)
    }

    async fn active_session(&mut self, user_id: Uuid, test_block_id: Uuid) -> StoreResult<Option<TestSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM test_sessions
             WHERE user_id = $1 AND test_block_id = $2 AND NOT is_finished"
        );
        Ok(sqlx::query_as::<_, TestSession>(&sql)
            .bind(user_id)
            .bind(test_block_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn session_by_token(&mut self, token: Uuid) -> StoreResult<Option<TestSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM test_sessions WHERE token = $1");
        Ok(sqlx::query_as::<_, TestSession>(&sql)
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn session_for_update(&mut self, token: Uuid) -> StoreResult<Option<TestSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM test_sessions WHERE token = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, TestSession>(&sql)
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_session(&mut self, session: &TestSession) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO test_sessions (token, user_id, test_block_id, started_at, finished_at, is_finished, summary_score)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(session.token)
        .bind(session.user_id)
        .bind(session.test_block_id)
        .bind(session.started_at)
        .bind(session.finished_at)
        .bind(session.is_finished)
        .bind(session.summary_score)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn finish_session(&mut self, token: Uuid, finished_at: DateTime<Utc>, score: f64) -> StoreResult<()> {
        sqlx::query(
            "UPDATE test_sessions SET is_finished = TRUE, finished_at = $2, summary_score = $3
             WHERE token = $1",
        )
        .bind(token)
        .bind(finished_at)
        .bind(score)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn expired_sessions(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT s.token FROM test_sessions s
             JOIN test_blocks b ON b.id = s.test_block_id
             WHERE NOT s.is_finished
               AND s.started_at + make_interval(secs => LEAST(b.time_for_test, 604800)) <= $1
             ORDER BY s.started_at",
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(|(token,)| token).collect())
    }

    async fn user_answer(&mut self, session_token: Uuid, question_id: Uuid) -> StoreResult<Option<TestUserAnswer>> {
        let sql = format!(
            "SELECT {USER_ANSWER_COLUMNS} FROM test_user_answers WHERE session_token = $1 AND question_id = $2"
        );
        Ok(sqlx::query_as::<_, TestUserAnswer>(&sql)
            .bind(session_token)
            .bind(question_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn list_user_answers(&mut self, session_token: Uuid) -> StoreResult<Vec<TestUserAnswer>> {
        let sql = format!(
            "SELECT {USER_ANSWER_COLUMNS} FROM test_user_answers WHERE session_token = $1 ORDER BY answered_at"
        );
        Ok(sqlx::query_as::<_, TestUserAnswer>(&sql)
            .bind(session_token)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn delete_user_answer(&mut self, session_token: Uuid, question_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM test_user_answers WHERE session_token = $1 AND question_id = $2")
            .bind(session_token)
            .bind(question_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_user_answer(&mut self, answer: &TestUserAnswer) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO test_user_answers (id, session_token, question_id, selected_answers, score, answered_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(answer.id)
        .bind(answer.session_token)
        .bind(answer.question_id)
        .bind(&answer.selected_answers)
        .bind(answer.score)
        .bind(answer.answered_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_user_answer_score(&mut self, id: Uuid, score: f64) -> StoreResult<()> {
        sqlx::query("UPDATE test_user_answers SET score = $2 WHERE id = $1")
            .bind(id)
            .bind(score)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
