use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::{TestBlock, TestSession, TestUserAnswer};
use crate::database::{DatabaseError, Store, StoreTx};
use crate::jobs::{Job, JobQueue};
use crate::services::error::{ConflictReason, ServiceError, ServiceResult};
use crate::services::permissions::{self, Capability};
use crate::services::scoring::{score_question, validate_selection};
use crate::services::course_for_test_block;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Started,
    Resumed,
}

/// What the owner of a session sees about it
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub token: Uuid,
    pub test_block_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub is_finished: bool,
    pub time_left_secs: i64,
    pub answered_questions: Vec<Uuid>,
    /// Only present once the session is finished
    pub summary_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStart {
    pub outcome: SessionOutcome,
    pub session: SessionView,
}

/// One question's selection inside a submit call
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: Uuid,
    #[serde(default)]
    pub selected_answers: Vec<Uuid>,
}

/// Timed test attempts: creation under the retry cap, answer recording,
/// scoring and expiry.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
}

impl SessionService {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Start an attempt, or hand back the one already running
    pub async fn create_session(&self, principal: &Principal, test_block_id: Uuid) -> ServiceResult<SessionStart> {
        let mut tx = self.store.begin().await?;
        let test_block = load_test_block(tx.as_mut(), test_block_id).await?;
        let course_id = course_for_test_block(tx.as_mut(), &test_block).await?;
        permissions::require(tx.as_mut(), principal, course_id, Capability::Student).await?;

        tx.lock_session_slot(principal.id, test_block_id).await?;

        if let Some(active) = tx.active_session(principal.id, test_block_id).await? {
            let session = view(tx.as_mut(), &active, &test_block, Utc::now()).await?;
            return Ok(SessionStart { outcome: SessionOutcome::Resumed, session });
        }

        let used = tx.count_sessions(principal.id, test_block_id).await?;
        if used >= i64::from(test_block.possible_retries) {
            info!(
                "User {} has used {}/{} attempts on test {}",
                principal.username, used, test_block.possible_retries, test_block_id
            );
            return Err(ServiceError::Conflict(ConflictReason::RetryLimitExceeded));
        }

        let session = TestSession::start(principal.id, test_block_id, Utc::now());
        match tx.insert_session(&session).await {
            Ok(()) => {}
            Err(DatabaseError::UniqueViolation(_)) => {
                // Lost a race to a concurrent start; return the winner's session
                drop(tx);
                return self.resume(principal.id, &test_block).await;
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!("User {} started session {} on test {}", principal.username, session.token, test_block_id);

        let job = Job::FinishTestSession { session: session.token };
        if let Err(e) = self.queue.enqueue(job, duration_of(&test_block)).await {
            // The expiry sweep still picks the session up
            error!("Failed to schedule expiry of session {}: {}", session.token, e);
        }

        Ok(SessionStart {
            outcome: SessionOutcome::Started,
            session: SessionView {
                token: session.token,
                test_block_id,
                started_at: session.started_at,
                finished_at: None,
                is_finished: false,
                time_left_secs: test_block.time_for_test,
                answered_questions: Vec::new(),
                summary_score: None,
            },
        })
    }

    async fn resume(&self, user_id: Uuid, test_block: &TestBlock) -> ServiceResult<SessionStart> {
        let mut tx = self.store.begin().await?;
        let active = tx
            .active_session(user_id, test_block.id)
            .await?
            .ok_or_else(|| ServiceError::InconsistentState("concurrent session vanished".to_string()))?;
        let session = view(tx.as_mut(), &active, test_block, Utc::now()).await?;
        Ok(SessionStart { outcome: SessionOutcome::Resumed, session })
    }

    /// Record selections for some questions of a running session.
    /// The whole call is validated before anything is written.
    pub async fn submit_answers(
        &self,
        principal: &Principal,
        token: Uuid,
        submissions: Vec<AnswerSubmission>,
    ) -> ServiceResult<SessionView> {
        let mut tx = self.store.begin().await?;
        let session = owned_session(tx.as_mut(), principal, token).await?;
        let test_block = load_test_block(tx.as_mut(), session.test_block_id).await?;
        let now = Utc::now();

        if session.is_finished || session.is_expired(test_block.time_limit(), now) {
            return Err(ServiceError::Conflict(ConflictReason::SessionFinished));
        }

        let mut seen = HashSet::new();
        for submission in &submissions {
            if !seen.insert(submission.question_id) {
                return Err(ServiceError::field(
                    "question_id",
                    format!("Question {} submitted twice", submission.question_id),
                ));
            }
            let question = tx
                .question_by_id(submission.question_id)
                .await?
                .filter(|q| q.test_block_id == session.test_block_id)
                .ok_or(ServiceError::NotFound("question"))?;
            let answers = tx.list_answers(question.id).await?;
            validate_selection(&question, &answers, &submission.selected_answers)
                .map_err(|msg| ServiceError::field("selected_answers", msg))?;
        }

        for submission in submissions {
            tx.delete_user_answer(token, submission.question_id).await?;
            if submission.selected_answers.is_empty() {
                continue;
            }
            let record = TestUserAnswer {
                id: Uuid::new_v4(),
                session_token: token,
                question_id: submission.question_id,
                selected_answers: submission.selected_answers,
                score: 0.0,
                answered_at: now,
            };
            tx.insert_user_answer(&record).await?;
        }

        let current = view(tx.as_mut(), &session, &test_block, now).await?;
        tx.commit().await?;

        debug!("Recorded answers for session {}", token);
        Ok(current)
    }

    /// Explicit submit by the owner
    pub async fn finish_session(&self, principal: &Principal, token: Uuid) -> ServiceResult<SessionView> {
        let mut tx = self.store.begin().await?;
        let session = owned_session(tx.as_mut(), principal, token).await?;
        let session = tx.session_for_update(session.token).await?.ok_or(ServiceError::NotFound("session"))?;
        if session.is_finished {
            return Err(ServiceError::Conflict(ConflictReason::SessionFinished));
        }

        let test_block = load_test_block(tx.as_mut(), session.test_block_id).await?;
        let finished = finalize(tx.as_mut(), session, Utc::now()).await?;
        let result = view(tx.as_mut(), &finished, &test_block, Utc::now()).await?;
        tx.commit().await?;

        info!("User {} submitted session {} for {}", principal.username, token, finished.summary_score);
        Ok(result)
    }

    /// Job path: finish `token` if it is still running, silently otherwise
    pub async fn finish_by_job(&self, token: Uuid) -> ServiceResult<()> {
        self.finish_if_running(token, Utc::now()).await.map(|_| ())
    }

    async fn finish_if_running(&self, token: Uuid, now: DateTime<Utc>) -> ServiceResult<bool> {
        let mut tx = self.store.begin().await?;
        let Some(session) = tx.session_for_update(token).await? else {
            debug!("Session {} no longer exists", token);
            return Ok(false);
        };
        if session.is_finished {
            debug!("Session {} already finished", token);
            return Ok(false);
        }

        let finished = finalize(tx.as_mut(), session, now).await?;
        tx.commit().await?;

        info!("Session {} expired with score {}", token, finished.summary_score);
        Ok(true)
    }

    /// Finish every running session whose deadline has passed
    pub async fn sweep_expired(&self) -> ServiceResult<usize> {
        self.sweep_expired_at(Utc::now()).await
    }

    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let mut tx = self.store.begin().await?;
        let tokens = tx.expired_sessions(now).await?;
        drop(tx);

        let mut finished = 0;
        for token in tokens {
            if self.finish_if_running(token, now).await? {
                finished += 1;
            }
        }
        Ok(finished)
    }

    pub async fn session_view(&self, principal: &Principal, token: Uuid) -> ServiceResult<SessionView> {
        let mut tx = self.store.begin().await?;
        let session = owned_session(tx.as_mut(), principal, token).await?;
        let test_block = load_test_block(tx.as_mut(), session.test_block_id).await?;
        view(tx.as_mut(), &session, &test_block, Utc::now()).await
    }
}

fn duration_of(test_block: &TestBlock) -> std::time::Duration {
    test_block.time_limit().to_std().unwrap_or_default()
}

async fn load_test_block(tx: &mut dyn StoreTx, id: Uuid) -> ServiceResult<TestBlock> {
    tx.test_block_by_id(id).await?.ok_or(ServiceError::NotFound("test"))
}

/// Session `token` if `principal` may see it: the taker, or staff
async fn owned_session(tx: &mut dyn StoreTx, principal: &Principal, token: Uuid) -> ServiceResult<TestSession> {
    let session = tx.session_by_token(token).await?.ok_or(ServiceError::NotFound("session"))?;
    if session.user_id != principal.id && !principal.is_staff() {
        return Err(ServiceError::PermissionDenied);
    }
    Ok(session)
}

/// Score every question of the block and close the session
async fn finalize(tx: &mut dyn StoreTx, session: TestSession, now: DateTime<Utc>) -> ServiceResult<TestSession> {
    let mut total = 0.0;
    for question in tx.list_questions(session.test_block_id).await? {
        let Some(recorded) = tx.user_answer(session.token, question.id).await? else {
            continue;
        };
        let answers = tx.list_answers(question.id).await?;
        let points = score_question(&question, &answers, &recorded.selected_answers);
        tx.set_user_answer_score(recorded.id, points).await?;
        total += points;
    }

    tx.finish_session(session.token, now, total).await?;
    Ok(TestSession {
        finished_at: Some(now),
        is_finished: true,
        summary_score: total,
        ..session
    })
}

async fn view(
    tx: &mut dyn StoreTx,
    session: &TestSession,
    test_block: &TestBlock,
    now: DateTime<Utc>,
) -> ServiceResult<SessionView> {
    let answered_questions = tx
        .list_user_answers(session.token)
        .await?
        .into_iter()
        .map(|a| a.question_id)
        .collect();

    Ok(SessionView {
        token: session.token,
        test_block_id: session.test_block_id,
        started_at: session.started_at,
        finished_at: session.finished_at,
        is_finished: session.is_finished,
        time_left_secs: session.time_left(test_block.time_limit(), now).num_seconds(),
        answered_questions,
        summary_score: session.is_finished.then_some(session.summary_score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use crate::types::{Accessibility, AnswersType, GlobalRole};

    #[tokio::test]
    async fn second_start_resumes_the_running_session() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;

        let first = ctx.sessions().create_session(&stu, quiz.test_block_id).await.unwrap();
        assert_eq!(first.outcome, SessionOutcome::Started);
        assert_eq!(first.session.time_left_secs, 600);

        let second = ctx.sessions().create_session(&stu, quiz.test_block_id).await.unwrap();
        assert_eq!(second.outcome, SessionOutcome::Resumed);
        assert_eq!(second.session.token, first.session.token);

        let jobs = ctx.queue.take();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, Job::FinishTestSession { session: first.session.token });
        assert_eq!(jobs[0].1, std::time::Duration::from_secs(600));
    }

    #[tokio::test]
    async fn retry_cap_is_enforced() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(2).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let svc = ctx.sessions();

        for _ in 0..2 {
            let start = svc.create_session(&stu, quiz.test_block_id).await.unwrap();
            assert_eq!(start.outcome, SessionOutcome::Started);
            svc.finish_session(&stu, start.session.token).await.unwrap();
        }
        let err = svc.create_session(&stu, quiz.test_block_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ConflictReason::RetryLimitExceeded)));
    }

    #[tokio::test]
    async fn outsiders_cannot_start() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let outsider = ctx.user("out", GlobalRole::Student).await;
        let err = ctx.sessions().create_session(&outsider, quiz.test_block_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied));
    }

    #[tokio::test]
    async fn concurrent_starts_yield_one_session() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(3).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;

        let svc = ctx.sessions();
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                let stu = stu.clone();
                let block = quiz.test_block_id;
                tokio::spawn(async move { svc.create_session(&stu, block).await })
            })
            .collect();

        let mut tokens = HashSet::new();
        let mut started = 0;
        for joined in futures::future::join_all(tasks).await {
            let start = joined.unwrap().unwrap();
            if start.outcome == SessionOutcome::Started {
                started += 1;
            }
            tokens.insert(start.session.token);
        }
        assert_eq!(started, 1);
        assert_eq!(tokens.len(), 1);
    }

    #[tokio::test]
    async fn exact_set_scoring_end_to_end() {
        let ctx = TestContext::new();
        // q1 single (A correct), q2 multiple (A and C correct), 1 point each
        let quiz = ctx.quiz(1).await;
        let q1 = ctx.question(&quiz, AnswersType::Single, &[true, false]).await;
        let q2 = ctx.question(&quiz, AnswersType::Multiple, &[true, false, true]).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let svc = ctx.sessions();

        let token = svc.create_session(&stu, quiz.test_block_id).await.unwrap().session.token;
        svc.submit_answers(
            &stu,
            token,
            vec![
                AnswerSubmission { question_id: q1.0, selected_answers: vec![q1.1[0]] },
                AnswerSubmission { question_id: q2.0, selected_answers: vec![q2.1[0]] },
            ],
        )
        .await
        .unwrap();

        let result = svc.finish_session(&stu, token).await.unwrap();
        assert!(result.is_finished);
        assert_eq!(result.summary_score, Some(1.0));
        assert_eq!(result.time_left_secs, 0);
    }

    #[tokio::test]
    async fn invalid_submission_writes_nothing() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let q1 = ctx.question(&quiz, AnswersType::Single, &[true, false]).await;
        let q2 = ctx.question(&quiz, AnswersType::Single, &[true, false]).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let svc = ctx.sessions();
        let token = svc.create_session(&stu, quiz.test_block_id).await.unwrap().session.token;

        let err = svc
            .submit_answers(
                &stu,
                token,
                vec![
                    AnswerSubmission { question_id: q1.0, selected_answers: vec![q1.1[0]] },
                    AnswerSubmission { question_id: q2.0, selected_answers: q2.1.clone() },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let view = svc.session_view(&stu, token).await.unwrap();
        assert!(view.answered_questions.is_empty());
    }

    #[tokio::test]
    async fn answers_are_replaced_and_cleared() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let q = ctx.question(&quiz, AnswersType::Single, &[true, false]).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let svc = ctx.sessions();
        let token = svc.create_session(&stu, quiz.test_block_id).await.unwrap().session.token;

        let pick = |i: usize| vec![AnswerSubmission { question_id: q.0, selected_answers: vec![q.1[i]] }];
        svc.submit_answers(&stu, token, pick(1)).await.unwrap();
        let view = svc.submit_answers(&stu, token, pick(0)).await.unwrap();
        assert_eq!(view.answered_questions, vec![q.0]);

        let cleared = svc
            .submit_answers(&stu, token, vec![AnswerSubmission { question_id: q.0, selected_answers: vec![] }])
            .await
            .unwrap();
        assert!(cleared.answered_questions.is_empty());
    }

    #[tokio::test]
    async fn foreign_sessions_and_questions_are_refused() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let other_quiz = ctx.quiz(1).await;
        let foreign = ctx.question(&other_quiz, AnswersType::Single, &[true, false]).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let peer = ctx.enrolled_student(&quiz, "peer").await;
        let svc = ctx.sessions();
        let token = svc.create_session(&stu, quiz.test_block_id).await.unwrap().session.token;

        let err = svc.submit_answers(&peer, token, vec![]).await.unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied));

        let err = svc
            .submit_answers(
                &stu,
                token,
                vec![AnswerSubmission { question_id: foreign.0, selected_answers: vec![foreign.1[0]] }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn finishing_is_idempotent() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let q = ctx.question(&quiz, AnswersType::Single, &[true, false]).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let svc = ctx.sessions();
        let token = svc.create_session(&stu, quiz.test_block_id).await.unwrap().session.token;
        svc.submit_answers(&stu, token, vec![AnswerSubmission { question_id: q.0, selected_answers: vec![q.1[0]] }])
            .await
            .unwrap();

        // Expiry job first, then a late explicit submit, then the job again
        ctx.run_jobs().await;
        let first = svc.session_view(&stu, token).await.unwrap();
        assert_eq!(first.summary_score, Some(1.0));

        let err = svc.finish_session(&stu, token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ConflictReason::SessionFinished)));
        svc.finish_by_job(token).await.unwrap();

        let again = svc.session_view(&stu, token).await.unwrap();
        assert_eq!(again.finished_at, first.finished_at);
        assert_eq!(again.summary_score, Some(1.0));

        let err = svc.submit_answers(&stu, token, vec![]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ConflictReason::SessionFinished)));
    }

    #[tokio::test]
    async fn unanswered_attempt_expires_with_zero_and_spends_the_retry() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        ctx.question(&quiz, AnswersType::Single, &[true, false]).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let svc = ctx.sessions();
        let token = svc.create_session(&stu, quiz.test_block_id).await.unwrap().session.token;

        // The timer fires without any submit
        ctx.run_jobs().await;
        let view = svc.session_view(&stu, token).await.unwrap();
        assert!(view.is_finished);
        assert_eq!(view.summary_score, Some(0.0));
        assert_eq!(view.time_left_secs, 0);

        let err = svc.create_session(&stu, quiz.test_block_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ConflictReason::RetryLimitExceeded)));
    }

    #[tokio::test]
    async fn oversized_time_limits_never_break_sessions() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(2).await;
        let q = ctx.question(&quiz, AnswersType::Single, &[true, false]).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;

        for secs in [i64::MAX, 9_000_000_000_000] {
            let patch = crate::services::quiz::TestConfigPatch { time_for_test: Some(secs), possible_retries: None };
            let err = ctx.quiz_service().update_test_config(&quiz.owner, quiz.test_block_id, patch).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation { .. }));
        }

        // A row that bypassed validation still yields working sessions
        let mut tx = ctx.store.begin().await.unwrap();
        let mut test_block = tx.test_block_by_id(quiz.test_block_id).await.unwrap().unwrap();
        test_block.time_for_test = i64::MAX;
        tx.update_test_block(&test_block).await.unwrap();
        tx.commit().await.unwrap();

        let svc = ctx.sessions();
        let token = svc.create_session(&stu, quiz.test_block_id).await.unwrap().session.token;
        let resumed = svc.create_session(&stu, quiz.test_block_id).await.unwrap();
        assert_eq!(resumed.outcome, SessionOutcome::Resumed);
        assert!(resumed.session.time_left_secs > 0);

        svc.submit_answers(&stu, token, vec![AnswerSubmission { question_id: q.0, selected_answers: vec![q.1[0]] }])
            .await
            .unwrap();
        assert_eq!(svc.sweep_expired_at(Utc::now()).await.unwrap(), 0);
        assert!(!svc.session_view(&stu, token).await.unwrap().is_finished);
    }

    #[tokio::test]
    async fn sweep_finishes_only_overdue_sessions() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let svc = ctx.sessions();
        let token = svc.create_session(&stu, quiz.test_block_id).await.unwrap().session.token;
        ctx.queue.take();

        assert_eq!(svc.sweep_expired_at(Utc::now()).await.unwrap(), 0);
        assert_eq!(svc.sweep_expired_at(Utc::now() + chrono::Duration::hours(2)).await.unwrap(), 1);
        assert_eq!(svc.sweep_expired_at(Utc::now() + chrono::Duration::hours(2)).await.unwrap(), 0);

        let view = svc.session_view(&stu, token).await.unwrap();
        assert!(view.is_finished);
        assert_eq!(view.summary_score, Some(0.0));
    }

    #[tokio::test]
    async fn public_course_quiz_is_open_after_joining() {
        let ctx = TestContext::new();
        let owner = ctx.teacher("owner").await;
        let course = ctx.course(&owner, Accessibility::Public).await;
        let quiz = ctx.quiz_in(&owner, course, 1).await;
        let stu = ctx.user("stu", GlobalRole::Student).await;

        assert!(ctx.sessions().create_session(&stu, quiz.test_block_id).await.is_err());
        ctx.membership().request_to_join(&stu, course).await.unwrap();
        assert!(ctx.sessions().create_session(&stu, quiz.test_block_id).await.is_ok());
    }
}
