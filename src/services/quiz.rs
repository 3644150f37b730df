use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::{TestAnswer, TestBlock, TestQuestion, MAX_TIME_FOR_TEST};
use crate::database::{Ordered, Store, StoreTx};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::ordering::{self, Slot};
use crate::services::permissions::{self, Capability};
use crate::services::course_for_test_block;
use crate::types::AnswersType;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestConfigPatch {
    pub time_for_test: Option<i64>,
    pub possible_retries: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAnswer {
    pub answer_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub question: String,
    pub answers_type: AnswersType,
    #[serde(default = "default_points")]
    pub max_points: f64,
    pub answers: Vec<NewAnswer>,
}

fn default_points() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerView {
    pub id: Uuid,
    pub order: i32,
    pub answer_text: String,
    /// Hidden from students
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub test_block_id: Uuid,
    pub order: i32,
    pub question: String,
    pub answers_type: AnswersType,
    pub max_points: f64,
    pub answers: Vec<AnswerView>,
}

impl QuestionView {
    fn build(question: TestQuestion, answers: Vec<TestAnswer>, reveal: bool) -> Self {
        Self {
            id: question.id,
            test_block_id: question.test_block_id,
            order: question.order,
            question: question.question,
            answers_type: question.answers_type,
            max_points: question.max_points,
            answers: answers
                .into_iter()
                .map(|a| AnswerView {
                    id: a.id,
                    order: a.order,
                    answer_text: a.answer_text,
                    is_correct: reveal.then_some(a.is_correct),
                })
                .collect(),
        }
    }
}

fn validate_question(new: &NewQuestion) -> ServiceResult<()> {
    if new.question.trim().chars().count() <= 2 {
        return Err(ServiceError::field("question", "Question must be longer than 2 characters"));
    }
    if !new.max_points.is_finite() || new.max_points < 0.0 {
        return Err(ServiceError::field("max_points", "Points must be a non-negative number"));
    }
    if new.answers.iter().any(|a| a.answer_text.trim().is_empty()) {
        return Err(ServiceError::field("answers", "Answers must not be empty"));
    }

    let correct = new.answers.iter().filter(|a| a.is_correct).count();
    match new.answers_type {
        AnswersType::Single if correct != 1 => Err(ServiceError::field(
            "answers",
            "A single-choice question needs exactly one correct answer",
        )),
        AnswersType::Multiple if correct == 0 => Err(ServiceError::field(
            "answers",
            "A multiple-choice question needs at least one correct answer",
        )),
        _ => Ok(()),
    }
}

fn validate_config(test_block: &TestBlock) -> ServiceResult<()> {
    if test_block.time_for_test <= 0 {
        return Err(ServiceError::field("time_for_test", "Time limit must be positive"));
    }
    if test_block.time_for_test > MAX_TIME_FOR_TEST {
        return Err(ServiceError::field("time_for_test", "Time limit cannot exceed one week"));
    }
    if test_block.possible_retries < 1 {
        return Err(ServiceError::field("possible_retries", "At least one attempt is required"));
    }
    Ok(())
}

async fn write_answers(tx: &mut dyn StoreTx, question_id: Uuid, answers: Vec<NewAnswer>) -> ServiceResult<Vec<TestAnswer>> {
    let mut written = Vec::with_capacity(answers.len());
    for (i, answer) in answers.into_iter().enumerate() {
        let row = TestAnswer {
            id: Uuid::new_v4(),
            question_id,
            order: i as i32 + 1,
            answer_text: answer.answer_text.trim().to_string(),
            is_correct: answer.is_correct,
        };
        tx.insert_answer(&row).await?;
        written.push(row);
    }
    Ok(written)
}

/// Test settings and question authoring
#[derive(Clone)]
pub struct QuizService {
    store: Arc<dyn Store>,
}

impl QuizService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn authoring_block(
        &self,
        tx: &mut dyn StoreTx,
        actor: &Principal,
        test_block_id: Uuid,
        capability: Capability,
    ) -> ServiceResult<(TestBlock, bool)> {
        let test_block = tx
            .test_block_by_id(test_block_id)
            .await?
            .ok_or(ServiceError::NotFound("test"))?;
        let course_id = course_for_test_block(tx, &test_block).await?;
        let role = permissions::require(tx, actor, course_id, capability).await?;
        let can_author = permissions::has_capability(Some(role), Capability::CoLecturerOrAbove);
        Ok((test_block, can_author))
    }

    pub async fn get_test_config(&self, actor: &Principal, test_block_id: Uuid) -> ServiceResult<TestBlock> {
        let mut tx = self.store.begin().await?;
        let (test_block, _) = self
            .authoring_block(tx.as_mut(), actor, test_block_id, Capability::Student)
            .await?;
        Ok(test_block)
    }

    pub async fn update_test_config(
        &self,
        actor: &Principal,
        test_block_id: Uuid,
        patch: TestConfigPatch,
    ) -> ServiceResult<TestBlock> {
        let mut tx = self.store.begin().await?;
        let (mut test_block, _) = self
            .authoring_block(tx.as_mut(), actor, test_block_id, Capability::CoLecturerOrAbove)
            .await?;

        if let Some(secs) = patch.time_for_test {
            test_block.time_for_test = secs;
        }
        if let Some(retries) = patch.possible_retries {
            test_block.possible_retries = retries;
        }
        validate_config(&test_block)?;

        tx.update_test_block(&test_block).await?;
        tx.commit().await?;

        info!(
            "User {} set test {} to {}s / {} attempts",
            actor.username, test_block_id, test_block.time_for_test, test_block.possible_retries
        );
        Ok(test_block)
    }

    pub async fn create_question(
        &self,
        actor: &Principal,
        test_block_id: Uuid,
        new: NewQuestion,
    ) -> ServiceResult<QuestionView> {
        validate_question(&new)?;
        let mut tx = self.store.begin().await?;
        self.authoring_block(tx.as_mut(), actor, test_block_id, Capability::CoLecturerOrAbove)
            .await?;

        let order = ordering::next_order(tx.as_mut(), Ordered::Question, test_block_id).await?;
        let question = TestQuestion {
            id: Uuid::new_v4(),
            test_block_id,
            order,
            question: new.question.trim().to_string(),
            answers_type: new.answers_type,
            max_points: new.max_points,
        };
        tx.insert_question(&question).await?;
        let answers = write_answers(tx.as_mut(), question.id, new.answers).await?;
        tx.commit().await?;

        Ok(QuestionView::build(question, answers, true))
    }

    /// Overwrite a question's text, type, points and its full answer list
    pub async fn replace_question(
        &self,
        actor: &Principal,
        question_id: Uuid,
        new: NewQuestion,
    ) -> ServiceResult<QuestionView> {
        validate_question(&new)?;
        let mut tx = self.store.begin().await?;
        let mut question = tx
            .question_by_id(question_id)
            .await?
            .ok_or(ServiceError::NotFound("question"))?;
        self.authoring_block(tx.as_mut(), actor, question.test_block_id, Capability::CoLecturerOrAbove)
            .await?;

        question.question = new.question.trim().to_string();
        question.answers_type = new.answers_type;
        question.max_points = new.max_points;
        tx.update_question(&question).await?;
        tx.delete_answers(question_id).await?;
        let answers = write_answers(tx.as_mut(), question_id, new.answers).await?;
        tx.commit().await?;

        Ok(QuestionView::build(question, answers, true))
    }

    pub async fn delete_question(&self, actor: &Principal, question_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let question = tx
            .question_by_id(question_id)
            .await?
            .ok_or(ServiceError::NotFound("question"))?;
        self.authoring_block(tx.as_mut(), actor, question.test_block_id, Capability::CoLecturerOrAbove)
            .await?;

        tx.delete_question(question_id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn swap_questions(&self, actor: &Principal, first: Uuid, second: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let a = tx.question_by_id(first).await?.ok_or(ServiceError::NotFound("question"))?;
        let b = tx.question_by_id(second).await?.ok_or(ServiceError::NotFound("question"))?;
        self.authoring_block(tx.as_mut(), actor, a.test_block_id, Capability::CoLecturerOrAbove)
            .await?;

        ordering::swap(
            tx.as_mut(),
            Ordered::Question,
            Slot { id: a.id, parent_id: a.test_block_id, order: a.order },
            Slot { id: b.id, parent_id: b.test_block_id, order: b.order },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Questions in order. Correct flags are only revealed to authors.
    pub async fn list_questions(&self, actor: &Principal, test_block_id: Uuid) -> ServiceResult<Vec<QuestionView>> {
        let mut tx = self.store.begin().await?;
        let (_, reveal) = self
            .authoring_block(tx.as_mut(), actor, test_block_id, Capability::Student)
            .await?;

        let mut views = Vec::new();
        for question in tx.list_questions(test_block_id).await? {
            let answers = tx.list_answers(question.id).await?;
            views.push(QuestionView::build(question, answers, reveal));
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use crate::types::GlobalRole;

    fn single(text: &str) -> NewQuestion {
        NewQuestion {
            question: text.to_string(),
            answers_type: AnswersType::Single,
            max_points: 1.0,
            answers: vec![
                NewAnswer { answer_text: "yes".into(), is_correct: true },
                NewAnswer { answer_text: "no".into(), is_correct: false },
            ],
        }
    }

    #[tokio::test]
    async fn question_rules_are_enforced() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let svc = ctx.quiz_service();

        let err = svc.create_question(&quiz.owner, quiz.test_block_id, single("ok")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let mut two_correct = single("Which one?");
        two_correct.answers[1].is_correct = true;
        assert!(svc.create_question(&quiz.owner, quiz.test_block_id, two_correct).await.is_err());

        let mut none_correct = single("Which ones?");
        none_correct.answers_type = AnswersType::Multiple;
        none_correct.answers[0].is_correct = false;
        assert!(svc.create_question(&quiz.owner, quiz.test_block_id, none_correct).await.is_err());
    }

    #[tokio::test]
    async fn questions_append_and_swap() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let svc = ctx.quiz_service();

        let a = svc.create_question(&quiz.owner, quiz.test_block_id, single("First?")).await.unwrap();
        let b = svc.create_question(&quiz.owner, quiz.test_block_id, single("Second?")).await.unwrap();
        assert_eq!((a.order, b.order), (1, 2));

        svc.swap_questions(&quiz.owner, a.id, b.id).await.unwrap();
        let listed = svc.list_questions(&quiz.owner, quiz.test_block_id).await.unwrap();
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);
    }

    #[tokio::test]
    async fn students_do_not_see_correct_flags() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        ctx.quiz_service()
            .create_question(&quiz.owner, quiz.test_block_id, single("Is it?"))
            .await
            .unwrap();
        let stu = ctx.enrolled_student(&quiz, "stu").await;

        let student_view = ctx.quiz_service().list_questions(&stu, quiz.test_block_id).await.unwrap();
        assert!(student_view[0].answers.iter().all(|a| a.is_correct.is_none()));

        let author_view = ctx.quiz_service().list_questions(&quiz.owner, quiz.test_block_id).await.unwrap();
        assert_eq!(author_view[0].answers[0].is_correct, Some(true));
    }

    #[tokio::test]
    async fn replacing_swaps_out_all_answers() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let svc = ctx.quiz_service();
        let q = svc.create_question(&quiz.owner, quiz.test_block_id, single("Is it?")).await.unwrap();

        let mut replacement = single("Is it really?");
        replacement.answers.push(NewAnswer { answer_text: "maybe".into(), is_correct: false });
        let updated = svc.replace_question(&quiz.owner, q.id, replacement).await.unwrap();
        assert_eq!(updated.answers.len(), 3);
        assert!(updated.answers.iter().all(|a| !q.answers.iter().any(|old| old.id == a.id)));
    }

    #[tokio::test]
    async fn config_updates_are_validated_and_gated() {
        let ctx = TestContext::new();
        let quiz = ctx.quiz(1).await;
        let stu = ctx.enrolled_student(&quiz, "stu").await;
        let svc = ctx.quiz_service();

        let patch = TestConfigPatch { time_for_test: Some(0), possible_retries: None };
        assert!(matches!(
            svc.update_test_config(&quiz.owner, quiz.test_block_id, patch).await,
            Err(ServiceError::Validation { .. })
        ));

        let patch = TestConfigPatch { time_for_test: Some(120), possible_retries: Some(3) };
        assert!(matches!(
            svc.update_test_config(&stu, quiz.test_block_id, patch.clone()).await,
            Err(ServiceError::PermissionDenied)
        ));
        let updated = svc.update_test_config(&quiz.owner, quiz.test_block_id, patch).await.unwrap();
        assert_eq!((updated.time_for_test, updated.possible_retries), (120, 3));

        let outsider = ctx.user("out", GlobalRole::Student).await;
        assert!(svc.get_test_config(&outsider, quiz.test_block_id).await.is_err());
    }
}
