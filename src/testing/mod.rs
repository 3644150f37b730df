use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::Principal;
use crate::config::AppConfig;
use crate::database::models::CourseJoinRequest;
use crate::database::{MemoryStore, Store};
use crate::jobs::{JobHandler, ManualJobQueue};
use crate::services::courses::{NewBlock, NewCourse};
use crate::services::quiz::{NewAnswer, NewQuestion, TestConfigPatch};
use crate::services::{AppState, CourseService, MembershipService, QuizService, SessionService, UserService};
use crate::types::{Accessibility, AnswersType, ContentType, CourseRole, GlobalRole, JoinStatus, ModerationStatus};

/// A test block plus the course and author it belongs to
#[derive(Debug, Clone)]
pub struct TestQuiz {
    pub course_id: Uuid,
    pub owner: Principal,
    pub block_id: Uuid,
    pub test_block_id: Uuid,
}

/// In-memory world for service tests: store, manual job queue and fixture builders
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<ManualJobQueue>,
    pub state: AppState,
    counter: AtomicUsize,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(ManualJobQueue::new());
        let state = AppState::new(store.clone(), queue.clone(), AppConfig::development());
        Self {
            store,
            queue,
            state,
            counter: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn courses(&self) -> CourseService {
        self.state.courses()
    }

    pub fn membership(&self) -> MembershipService {
        self.state.membership()
    }

    pub fn quiz_service(&self) -> QuizService {
        self.state.quiz()
    }

    pub fn sessions(&self) -> SessionService {
        self.state.sessions()
    }

    pub fn users(&self) -> UserService {
        self.state.users()
    }

    /// Run everything the services enqueued, ignoring delays
    pub async fn run_jobs(&self) {
        let handler = JobHandler::new(self.store.clone(), self.queue.clone());
        self.queue.run_pending(&handler).await;
    }

    pub async fn user(&self, username: &str, role: GlobalRole) -> Principal {
        let user = match role {
            GlobalRole::Staff => self.users().create_staff(username).await.unwrap(),
            _ => self.users().register(username, role).await.unwrap(),
        };
        Principal::from(user)
    }

    /// A teacher who already passed moderation
    pub async fn teacher(&self, username: &str) -> Principal {
        let teacher = self.user(username, GlobalRole::Teacher).await;
        let approved = self
            .users()
            .set_status(teacher.id, ModerationStatus::Approved)
            .await
            .unwrap();
        Principal::from(approved)
    }

    pub async fn staff(&self) -> Principal {
        let name = format!("staff{}", self.next());
        self.user(&name, GlobalRole::Staff).await
    }

    pub async fn course(&self, owner: &Principal, accessibility: Accessibility) -> Uuid {
        let new = NewCourse {
            title: format!("Course {}", self.next()),
            short_description: String::new(),
            accessibility,
        };
        self.courses().create_course(owner, new).await.unwrap().id
    }

    pub async fn course_code(&self, course_id: Uuid) -> String {
        let mut tx = self.store.begin().await.unwrap();
        tx.course_by_id(course_id).await.unwrap().unwrap().course_code
    }

    pub async fn role_of(&self, course_id: Uuid, user_id: Uuid) -> Option<CourseRole> {
        let mut tx = self.store.begin().await.unwrap();
        tx.course_role(course_id, user_id).await.unwrap()
    }

    pub async fn is_member(&self, course_id: Uuid, user_id: Uuid) -> bool {
        let mut tx = self.store.begin().await.unwrap();
        tx.is_member(course_id, user_id).await.unwrap()
    }

    pub async fn request(&self, course_id: Uuid, user_id: Uuid) -> CourseJoinRequest {
        let mut tx = self.store.begin().await.unwrap();
        tx.join_request_for(course_id, user_id).await.unwrap().unwrap()
    }

    pub async fn request_status(&self, course_id: Uuid, user_id: Uuid) -> Option<JoinStatus> {
        let mut tx = self.store.begin().await.unwrap();
        tx.join_request_for(course_id, user_id)
            .await
            .unwrap()
            .map(|r| r.status)
    }

    /// Fresh teacher, moderated course and a test block allowing `retries` attempts
    pub async fn quiz(&self, retries: i32) -> TestQuiz {
        let owner = self.teacher(&format!("author{}", self.next())).await;
        let course_id = self.course(&owner, Accessibility::OnRequests).await;
        self.quiz_in(&owner, course_id, retries).await
    }

    pub async fn quiz_in(&self, owner: &Principal, course_id: Uuid, retries: i32) -> TestQuiz {
        let section = self
            .courses()
            .list_sections(owner, course_id)
            .await
            .unwrap()
            .remove(0);
        let view = self
            .courses()
            .create_block(
                owner,
                section.id,
                NewBlock {
                    title: format!("Quiz {}", self.next()),
                    content: String::new(),
                    content_type: ContentType::Test,
                },
            )
            .await
            .unwrap();
        let test_block = view.test.unwrap();

        self.quiz_service()
            .update_test_config(
                owner,
                test_block.id,
                TestConfigPatch { time_for_test: None, possible_retries: Some(retries) },
            )
            .await
            .unwrap();

        TestQuiz {
            course_id,
            owner: owner.clone(),
            block_id: view.block.id,
            test_block_id: test_block.id,
        }
    }

    /// A student who is a member of the quiz's course
    pub async fn enrolled_student(&self, quiz: &TestQuiz, username: &str) -> Principal {
        let student = self.user(username, GlobalRole::Student).await;
        let mut tx = self.store.begin().await.unwrap();
        tx.add_member(quiz.course_id, student.id).await.unwrap();
        tx.upsert_course_role(quiz.course_id, student.id, CourseRole::Student)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        student
    }

    /// Add a question whose answers are correct per `correct`; returns question and answer ids
    pub async fn question(&self, quiz: &TestQuiz, kind: AnswersType, correct: &[bool]) -> (Uuid, Vec<Uuid>) {
        let new = NewQuestion {
            question: format!("Question {}?", self.next()),
            answers_type: kind,
            max_points: 1.0,
            answers: correct
                .iter()
                .enumerate()
                .map(|(i, c)| NewAnswer {
                    answer_text: format!("answer {}", i + 1),
                    is_correct: *c,
                })
                .collect(),
        };
        let view = self
            .quiz_service()
            .create_question(&quiz.owner, quiz.test_block_id, new)
            .await
            .unwrap();
        (view.id, view.answers.into_iter().map(|a| a.id).collect())
    }
}
