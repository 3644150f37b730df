use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{AnswersType, ContentType};

/// A block inside a section: either a lection (free text) or a test
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SectionContent {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: String,
    pub content: String,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    pub order: i32,
}

/// Longest allowed session, one week
pub const MAX_TIME_FOR_TEST: i64 = 7 * 24 * 60 * 60;

/// Test settings attached one-to-one to a test-typed block
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestBlock {
    pub id: Uuid,
    pub block_id: Uuid,
    /// Time limit of one session, in seconds
    pub time_for_test: i64,
    pub possible_retries: i32,
}

impl TestBlock {
    /// Stored limit clamped to `0..=MAX_TIME_FOR_TEST`, so rows written before
    /// validation existed still yield a usable duration
    pub fn time_limit(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.time_for_test.clamp(0, MAX_TIME_FOR_TEST))
            .unwrap_or_else(chrono::Duration::zero)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestQuestion {
    pub id: Uuid,
    pub test_block_id: Uuid,
    pub order: i32,
    pub question: String,
    #[sqlx(try_from = "String")]
    pub answers_type: AnswersType,
    pub max_points: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAnswer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub order: i32,
    pub answer_text: String,
    pub is_correct: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_limits_are_clamped() {
        let block = TestBlock {
            id: Uuid::new_v4(),
            block_id: Uuid::new_v4(),
            time_for_test: i64::MAX,
            possible_retries: 1,
        };
        assert_eq!(block.time_limit(), chrono::Duration::seconds(MAX_TIME_FOR_TEST));

        let negative = TestBlock { time_for_test: -5, ..block };
        assert_eq!(negative.time_limit(), chrono::Duration::zero());
    }
}
